use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub format: ServiceFormat,
    pub duration_minutes: i32,
    pub price_cents: i64,
    pub deposit_cents: i64,
    pub status: ServiceStatus,
    pub topic_code: Option<String>,
}

impl Service {
    pub fn is_published(&self) -> bool {
        self.status == ServiceStatus::Published
    }

    /// Resolves the delivery format a booking will use.
    ///
    /// An omitted format falls back to the service's own format (online for
    /// hybrid services). A requested format must match exactly, except that a
    /// hybrid service accepts either online or offline.
    pub fn resolve_format(&self, requested: Option<ServiceFormat>) -> Option<ServiceFormat> {
        match requested {
            None if self.format == ServiceFormat::Hybrid => Some(ServiceFormat::Online),
            None => Some(self.format),
            Some(f) if f == self.format => Some(f),
            Some(f @ (ServiceFormat::Online | ServiceFormat::Offline))
                if self.format == ServiceFormat::Hybrid =>
            {
                Some(f)
            }
            Some(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ServiceFormat {
    Online,
    Offline,
    Hybrid,
}

impl ServiceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceFormat::Online => "online",
            ServiceFormat::Offline => "offline",
            ServiceFormat::Hybrid => "hybrid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "online" => Some(ServiceFormat::Online),
            "offline" => Some(ServiceFormat::Offline),
            "hybrid" => Some(ServiceFormat::Hybrid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Published,
    Draft,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Published => "published",
            ServiceStatus::Draft => "draft",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "published" => ServiceStatus::Published,
            _ => ServiceStatus::Draft,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(format: ServiceFormat) -> Service {
        Service {
            id: "svc-1".to_string(),
            slug: "intro".to_string(),
            title: "Intro".to_string(),
            format,
            duration_minutes: 50,
            price_cents: 5000,
            deposit_cents: 1000,
            status: ServiceStatus::Published,
            topic_code: None,
        }
    }

    #[test]
    fn test_exact_format_match() {
        let svc = service(ServiceFormat::Online);
        assert_eq!(svc.resolve_format(Some(ServiceFormat::Online)), Some(ServiceFormat::Online));
        assert_eq!(svc.resolve_format(Some(ServiceFormat::Offline)), None);
        assert_eq!(svc.resolve_format(Some(ServiceFormat::Hybrid)), None);
    }

    #[test]
    fn test_hybrid_accepts_both() {
        let svc = service(ServiceFormat::Hybrid);
        assert_eq!(svc.resolve_format(Some(ServiceFormat::Online)), Some(ServiceFormat::Online));
        assert_eq!(svc.resolve_format(Some(ServiceFormat::Offline)), Some(ServiceFormat::Offline));
        assert_eq!(svc.resolve_format(Some(ServiceFormat::Hybrid)), Some(ServiceFormat::Hybrid));
    }

    #[test]
    fn test_omitted_format_defaults() {
        let offline = service(ServiceFormat::Offline);
        assert_eq!(offline.resolve_format(None), Some(ServiceFormat::Offline));
        let hybrid = service(ServiceFormat::Hybrid);
        assert_eq!(hybrid.resolve_format(None), Some(ServiceFormat::Online));
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(ServiceFormat::parse(" Online "), Some(ServiceFormat::Online));
        assert_eq!(ServiceFormat::parse("in-person"), None);
    }
}
