//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::pipeline::MAX_PIXEL_RATIO;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [render] section
    if let Some(section) = ini.section(Some("render")) {
        if let Some(v) = section.get("concurrency") {
            config.render.concurrency = match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(invalid("render", "concurrency", v, "must be a positive integer")),
            };
        }
        if let Some(v) = section.get("pixel_ratio") {
            config.render.pixel_ratio = match v.trim().parse::<f32>() {
                Ok(r) if r > 0.0 && r <= MAX_PIXEL_RATIO => r,
                _ => {
                    return Err(invalid(
                        "render",
                        "pixel_ratio",
                        v,
                        "must be a number greater than 0 and at most 8",
                    ))
                }
            };
        }
        if let Some(v) = section.get("format") {
            config.render.format = v
                .parse()
                .map_err(|_| invalid("render", "format", v, "must be one of: png, jpg, webp"))?;
        }
        if let Some(v) = section.get("tile_size") {
            config.render.tile_size = match v.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(invalid("render", "tile_size", v, "must be a positive integer")),
            };
        }
        if let Some(v) = section.get("failure_policy") {
            config.render.failure_policy = v
                .parse()
                .map_err(|_| invalid("render", "failure_policy", v, "must be 'skip' or 'abort'"))?;
        }
    }

    // [style] section
    if let Some(section) = ini.section(Some("style")) {
        if let Some(v) = section.get("name") {
            let v = v.trim();
            if !v.is_empty() {
                config.style.name = v.to_string();
            }
        }
        if let Some(v) = section.get("basemap_provider") {
            config.style.basemap_provider = parse_bool(v);
        }
    }

    // [output] section
    if let Some(section) = ini.section(Some("output")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.output.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("temp_dir") {
            let v = v.trim();
            if !v.is_empty() {
                config.output.temp_dir = expand_tilde(v);
            }
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a boolean value from a config string.
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::TileFailurePolicy;
    use crate::render::ImageFormat;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_gives_defaults() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_render_section() {
        let config = parse(
            "[render]\nconcurrency = 4\npixel_ratio = 2\nformat = JPEG\ntile_size = 512\nfailure_policy = abort\n",
        )
        .unwrap();

        assert_eq!(config.render.concurrency, 4);
        assert_eq!(config.render.pixel_ratio, 2.0);
        assert_eq!(config.render.format, ImageFormat::Jpg);
        assert_eq!(config.render.tile_size, 512);
        assert_eq!(config.render.failure_policy, TileFailurePolicy::Abort);
    }

    #[test]
    fn test_style_and_output_sections() {
        let config = parse(
            "[style]\nname = https://tiles.example.com/{z}/{x}/{y}.png\nbasemap_provider = yes\n\
             [output]\ndirectory = /srv/tiles\ntemp_dir = /var/tmp/kiln\n",
        )
        .unwrap();

        assert_eq!(config.style.name, "https://tiles.example.com/{z}/{x}/{y}.png");
        assert!(config.style.basemap_provider);
        assert_eq!(config.output.directory, PathBuf::from("/srv/tiles"));
        assert_eq!(config.output.temp_dir, PathBuf::from("/var/tmp/kiln"));
    }

    #[test]
    fn test_empty_style_name_keeps_default() {
        let config = parse("[style]\nname =\n").unwrap();
        assert_eq!(config.style.name, "protomaps");
    }

    #[test]
    fn test_invalid_values() {
        for content in [
            "[render]\nconcurrency = 0\n",
            "[render]\nconcurrency = many\n",
            "[render]\npixel_ratio = -1\n",
            "[render]\nformat = gif\n",
            "[render]\ntile_size = 0\n",
            "[render]\nfailure_policy = retry\n",
        ] {
            let err = parse(content).unwrap_err();
            assert!(
                matches!(err, ConfigFileError::InvalidValue { ref section, .. } if section == "render"),
                "expected invalid value for {:?}",
                content
            );
        }
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/tiles");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("tiles"));
        }
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }
}
