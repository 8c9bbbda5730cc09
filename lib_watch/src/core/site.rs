/// A watched site: the numeric id used in push topics, the API site
/// parameter used for REST queries and a display name for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRef {
    pub site_id: u32,
    pub api_site: String,
    pub name: String,
}

impl SiteRef {
    pub fn new(site_id: u32, api_site: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            site_id,
            api_site: api_site.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for SiteRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.site_id)
    }
}
