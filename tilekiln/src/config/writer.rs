//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! Produces the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[render]
; Renderer instances rendering tiles in parallel (default: 2)
; Each instance holds its own style and decoded resources
concurrency = {}
; Device pixel ratio; 2 renders 1024x1024 images for 512px tiles (default: 1)
pixel_ratio = {}
; Tile image format: png, jpg or webp (default: png)
format = {}
; Logical tile size of raster sources in generated styles (default: 256)
tile_size = {}
; What to do when a tile fails to render (default: skip)
;   skip  - log it, leave it out of the archive and report it at the end
;   abort - stop the run and keep the partial archive in the temp directory
failure_policy = {}

[style]
; Base style:
;   protomaps       - vector basemap from protomaps.pmtiles in the temp directory
;   <url template>  - raster tiles, e.g. https://example.com/{{z}}/{{x}}/{{y}}.png
;                     or mbtiles://<name>/{{z}}/{{x}}/{{y}} from the source directory
name = {}
; Use OpenStreetMap raster tiles as the basemap instead of the named style
basemap_provider = {}

[output]
; Directory receiving finished .mbtiles archives
directory = {}
; Dedicated working directory for archives being written; deleted with its
; contents after a successful run
; Must not contain the output directory
temp_dir = {}

[logging]
; Log file path (cleared at the start of every run)
file = {}
"#,
        config.render.concurrency,
        config.render.pixel_ratio,
        config.render.format,
        config.render.tile_size,
        config.render.failure_policy,
        config.style.name,
        config.style.basemap_provider,
        path_to_string(&config.output.directory),
        path_to_string(&config.output.temp_dir),
        path_to_string(&config.logging.file),
    )
}

/// Convert path to string, collapsing home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::super::settings::ConfigFile;
    use crate::pipeline::TileFailurePolicy;
    use crate::render::ImageFormat;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        let mut config = ConfigFile::default();
        config.render.concurrency = 3;
        config.render.pixel_ratio = 2.0;
        config.render.format = ImageFormat::Webp;
        config.render.failure_policy = TileFailurePolicy::Abort;
        config.style.name = "mbtiles://world/{z}/{x}/{y}".to_string();
        config.output.directory = PathBuf::from("/srv/tiles");

        config.save_to(&config_path).unwrap();
        let loaded = ConfigFile::load_from(&config_path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_saved_file_is_commented() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.ini");

        ConfigFile::default().save_to(&config_path).unwrap();
        let content = std::fs::read_to_string(&config_path).unwrap();

        assert!(content.contains("[render]"));
        assert!(content.contains("failure_policy = skip"));
        assert!(content.contains("; Base style:"));
    }
}
