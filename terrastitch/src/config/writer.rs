//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! Produces the commented INI representation written to `config.ini`.

use std::path::Path;

use super::file::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let access_token = config.mapbox.access_token.as_deref().unwrap_or("");

    format!(
        r#"[mapbox]
; Mapbox access token. The MBX_TOKEN environment variable takes precedence.
; Create one at https://account.mapbox.com/access-tokens/
access_token = {}
; Tile URL template. Placeholders: {{z}} {{x}} {{y}} {{token}}
url_template = {}

[download]
; Concurrent tile downloads
parallel = {}
; Request timeout in seconds
timeout = {}
; Attempts per tile including the first (1 disables retries)
max_retries = {}

[output]
; Composite file extension (tiles are always stored as .png)
extension = {}
; Raster joiner: image (built in) or vips (requires libvips on PATH)
joiner = {}
; Keep downloaded tiles after a successful run
keep_tiles = {}
; Fetch every tile of the bounding box so the composite has no holes
fill_gaps = {}

[cache]
; Parent directory for per-run tile directories
directory = {}

[logging]
; Log file location
file = {}
"#,
        access_token,
        config.mapbox.url_template,
        config.download.parallel,
        config.download.timeout,
        config.download.max_retries,
        config.output.extension,
        config.output.joiner,
        config.output.keep_tiles,
        config.output.fill_gaps,
        path_to_string(&config.cache.directory),
        path_to_string(&config.logging.file),
    )
}

/// Convert a path to a string, collapsing the home directory to `~`.
pub(super) fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
