use std::{error::Error, path::Path, str::FromStr};

use bf2::{bsp::BspBuilderConfig, collision, mesh};
use ini::{Ini, Properties};

/// Settings read from `conf.ini`.
///
/// ```ini
/// [bsp]
/// coplanar_weight = 0.5
/// intersect_weight = 1.0
/// split_weight = 1.0
/// min_split_metric = 0.5
/// min_leaf_faces = 1
/// max_depth = 64
///
/// [export]
/// recompute_bounds = true
/// rebuild_bsp = true
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub builder: BspBuilderConfig,
    pub recompute_bounds: bool,
    pub rebuild_bsp: bool,
}

impl Default for Config {
    fn default() -> Self {
        let export = collision::EncodeOptions::default();
        Self {
            builder: export.builder,
            recompute_bounds: export.recompute_bounds,
            rebuild_bsp: export.rebuild_bsp,
        }
    }
}

fn field<T: FromStr>(section: Option<&Properties>, key: &str, default: T) -> Result<T, Box<dyn Error>> {
    match section.and_then(|s| s.get(key)) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| format!("invalid value for {key}: {value:?}").into()),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let ini = Ini::load_from_file(path)?;
        Self::from_ini(&ini)
    }

    pub fn from_ini(ini: &Ini) -> Result<Self, Box<dyn Error>> {
        let defaults = Self::default();
        let bsp = ini.section(Some("bsp"));
        let export = ini.section(Some("export"));
        let b = defaults.builder;

        Ok(Self {
            builder: BspBuilderConfig {
                coplanar_weight: field(bsp, "coplanar_weight", b.coplanar_weight)?,
                intersect_weight: field(bsp, "intersect_weight", b.intersect_weight)?,
                split_weight: field(bsp, "split_weight", b.split_weight)?,
                min_split_metric: field(bsp, "min_split_metric", b.min_split_metric)?,
                min_leaf_faces: field(bsp, "min_leaf_faces", b.min_leaf_faces)?,
                max_depth: field(bsp, "max_depth", b.max_depth)?,
            },
            recompute_bounds: field(export, "recompute_bounds", defaults.recompute_bounds)?,
            rebuild_bsp: field(export, "rebuild_bsp", defaults.rebuild_bsp)?,
        })
    }

    pub fn mesh_options(&self) -> mesh::EncodeOptions {
        mesh::EncodeOptions {
            recompute_bounds: self.recompute_bounds,
        }
    }

    pub fn collision_options(&self) -> collision::EncodeOptions {
        collision::EncodeOptions {
            recompute_bounds: self.recompute_bounds,
            rebuild_bsp: self.rebuild_bsp,
            builder: self.builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_keep_defaults() {
        let ini = Ini::load_from_str("").unwrap();
        assert_eq!(Config::from_ini(&ini).unwrap(), Config::default());
    }

    #[test]
    fn sections_override_defaults() {
        let ini = Ini::load_from_str(
            "[bsp]\nmin_split_metric = 0.25\nmax_depth = 12\n[export]\nrebuild_bsp = false\n",
        )
        .unwrap();
        let config = Config::from_ini(&ini).unwrap();
        assert_eq!(config.builder.min_split_metric, 0.25);
        assert_eq!(config.builder.max_depth, 12);
        assert_eq!(config.builder.min_leaf_faces, 1);
        assert!(!config.rebuild_bsp);
        assert!(config.recompute_bounds);
        assert!(!config.collision_options().rebuild_bsp);
    }

    #[test]
    fn bad_values_are_reported() {
        let ini = Ini::load_from_str("[bsp]\nmax_depth = deep\n").unwrap();
        let err = Config::from_ini(&ini).unwrap_err();
        assert!(err.to_string().contains("max_depth"));
    }
}
