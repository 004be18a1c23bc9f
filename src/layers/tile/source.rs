use crate::core::geo::TileCoord;

/// Anything that can produce tile URLs for a given coordinate.
pub trait TileSource: Send + Sync {
    /// Build a URL for the requested `coord`.
    fn url(&self, coord: TileCoord) -> String;
}

/// A Leaflet-style URL template.
///
/// Recognised placeholders: `{z}`, `{x}`, `{y}`, `{-y}` (TMS row) and `{s}`
/// (subdomain, rotated by tile position).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
    subdomains: Vec<String>,
}

impl UrlTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            subdomains: Vec::new(),
        }
    }

    pub fn with_subdomains(mut self, subdomains: Vec<String>) -> Self {
        self.subdomains = subdomains;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    fn subdomain(&self, coord: TileCoord) -> &str {
        if self.subdomains.is_empty() {
            return "";
        }
        let idx = ((coord.x as usize) + (coord.y as usize)) % self.subdomains.len();
        &self.subdomains[idx]
    }
}

impl TileSource for UrlTemplate {
    fn url(&self, coord: TileCoord) -> String {
        let tms_y = 1u64
            .checked_shl(coord.z as u32)
            .unwrap_or(u64::MAX)
            .saturating_sub(1 + coord.y as u64);
        self.template
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{-y}", &tms_y.to_string())
            .replace("{y}", &coord.y.to_string())
            .replace("{s}", self.subdomain(coord))
    }
}
