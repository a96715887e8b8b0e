//! Postal district to merged district and local authority mapping

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// District name stored when the reported district is not in the mapping
pub const UNKNOWN_DISTRICT: &str = "UNKNOWN";

/// On-disk mapping file
///
/// ```toml
/// [districts.AB13]
/// merged = "AB13_AB14"
/// local_authorities = ["S12000033"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostDistrictMapping {
    #[serde(default)]
    pub districts: HashMap<String, DistrictEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistrictEntry {
    /// Coarser district name the reported one is merged into
    pub merged: String,

    /// Local authorities overlapping the district
    #[serde(default)]
    pub local_authorities: Vec<String>,
}

/// Location fields after mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedLocation {
    pub postal_district: String,
    pub local_authority: Option<String>,
}

/// Maps client-reported locations to the coarser ones that get stored.
///
/// Without a mapping file the mapper passes locations through unchanged.
#[derive(Debug, Clone, Default)]
pub struct PostDistrictMapper {
    mapping: Option<PostDistrictMapping>,
}

impl PostDistrictMapper {
    pub fn passthrough() -> Self {
        Self { mapping: None }
    }

    pub fn new(mapping: PostDistrictMapping) -> Self {
        let districts = mapping
            .districts
            .into_iter()
            .map(|(district, entry)| (normalize(&district), entry))
            .collect();
        Self {
            mapping: Some(PostDistrictMapping { districts }),
        }
    }

    /// Load a mapping from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MappingError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| MappingError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, MappingError> {
        let mapping: PostDistrictMapping =
            toml::from_str(content).map_err(|e| MappingError::ParseError(e.to_string()))?;
        Ok(Self::new(mapping))
    }

    /// Number of known districts, `None` in passthrough mode
    pub fn district_count(&self) -> Option<usize> {
        self.mapping.as_ref().map(|m| m.districts.len())
    }

    pub fn map(&self, postal_district: &str, local_authority: Option<&str>) -> MappedLocation {
        let Some(mapping) = &self.mapping else {
            return MappedLocation {
                postal_district: postal_district.to_string(),
                local_authority: local_authority.map(str::to_string),
            };
        };

        match mapping.districts.get(&normalize(postal_district)) {
            Some(entry) => MappedLocation {
                postal_district: entry.merged.clone(),
                local_authority: local_authority
                    .filter(|la| entry.local_authorities.iter().any(|known| known.as_str() == *la))
                    .map(str::to_string),
            },
            None => MappedLocation {
                postal_district: UNKNOWN_DISTRICT.to_string(),
                local_authority: None,
            },
        }
    }
}

fn normalize(district: &str) -> String {
    district.trim().to_ascii_uppercase()
}

/// Mapping file errors
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPING: &str = r#"
[districts.AB10]
merged = "AB10"
local_authorities = ["S12000033"]

[districts.AB13]
merged = "AB13_AB14"
local_authorities = ["S12000033", "S12000034"]

[districts.ab14]
merged = "AB13_AB14"
"#;

    #[test]
    fn test_merges_known_district() {
        let mapper = PostDistrictMapper::from_toml(MAPPING).unwrap();
        assert_eq!(mapper.district_count(), Some(3));

        let location = mapper.map("AB13", None);
        assert_eq!(location.postal_district, "AB13_AB14");
        assert_eq!(location.local_authority, None);

        let location = mapper.map("ab14", None);
        assert_eq!(location.postal_district, "AB13_AB14");
    }

    #[test]
    fn test_unknown_district() {
        let mapper = PostDistrictMapper::from_toml(MAPPING).unwrap();
        let location = mapper.map("F4KEP0STC0DE", Some("S12000033"));
        assert_eq!(location.postal_district, UNKNOWN_DISTRICT);
        assert_eq!(location.local_authority, None);
    }

    #[test]
    fn test_local_authority_must_match_district() {
        let mapper = PostDistrictMapper::from_toml(MAPPING).unwrap();

        let location = mapper.map("AB13", Some("S12000034"));
        assert_eq!(location.local_authority.as_deref(), Some("S12000034"));

        let location = mapper.map("AB10", Some("E09000001"));
        assert_eq!(location.postal_district, "AB10");
        assert_eq!(location.local_authority, None);
    }

    #[test]
    fn test_passthrough() {
        let mapper = PostDistrictMapper::passthrough();
        assert_eq!(mapper.district_count(), None);

        let location = mapper.map("ZZ99", Some("localAuthority"));
        assert_eq!(location.postal_district, "ZZ99");
        assert_eq!(location.local_authority.as_deref(), Some("localAuthority"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("districts.toml");
        std::fs::write(&path, MAPPING).unwrap();

        let mapper = PostDistrictMapper::load(&path).unwrap();
        assert_eq!(mapper.map("AB10", None).postal_district, "AB10");

        assert!(matches!(
            PostDistrictMapper::load(dir.path().join("missing.toml")),
            Err(MappingError::IoError(_))
        ));
        assert!(matches!(
            PostDistrictMapper::from_toml("districts = 3"),
            Err(MappingError::ParseError(_))
        ));
    }
}
