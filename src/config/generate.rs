pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LOGFERRY CONFIGURATION
# =============================================================================
# Logferry polls a paginated, newest-first log feed and appends everything newer
# than the stored watermark to an ordered log stream. One `logferry run` is one
# synchronization pass; schedule it externally and never run two at once
# against the same state.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/logferry/config.yml
#   3. /etc/logferry/config.yml
#
# Values may reference environment variables as $env{...} with the variable
# name between the braces.

# =============================================================================
# SOURCE
# =============================================================================
source:
  # Feed endpoint. Requested as ?limit=<page_size>&sort=timestamp:desc[&next=<cursor>]
  url: https://api.example.com/v2.0/projects/$env{PROJECT_ID}/logs
  page_size: 100
  # Header carrying the API key
  api_key_header: X-API-KEY
  # Entries are read from _embedded.<collection_key>
  collection_key: logEntry
  timestamp:
    field: timestamp
    # 'iso8601', 'epoch', 'epoch_ms', or a strptime format string
    format: iso8601
  # Abort the run if the feed is not newest-first instead of risking silent gaps
  verify_ordering: true
  connect_timeout: 1s
  request_timeout: 3s

# =============================================================================
# SINK
# =============================================================================
sink:
  type: duckdb
  log_group: app-logs
  log_stream: logferry-stream

# =============================================================================
# STATE
# =============================================================================
# Parameter names in the store holding the watermark (epoch ms) and the sink's
# next sequence token.
state:
  watermark_param: /logferry/last-ts-ms
  token_param: /logferry/last-seq-token

# =============================================================================
# CREDENTIAL
# =============================================================================
# The environment variable wins; otherwise the secret parameter is read.
credential:
  env_var: LOGFERRY_API_KEY
  secret_param: /logferry/api-key

# =============================================================================
# STORAGE
# =============================================================================
# DuckDB file holding both the parameter store and the log streams.
storage:
  path: ~/.local/share/logferry/logferry.duckdb
"#
    .to_string()
}
