//! # Host settings and address resolution.
//!
//! [`HostSettings::parse`] accepts either a host address URI
//! (`sb://namespace.servicebus.windows.net/scope`, `rabbitmq://localhost/vhost`)
//! or a connection string
//! (`Endpoint=sb://namespace.servicebus.windows.net/;SharedAccessKeyName=...;SharedAccessKey=...`).
//!
//! ## Resolution
//! ```text
//! parse(input)
//!   ├─► Url::parse(input)
//!   │     ├─ Ok(url)                    → from_url(url)  (must carry a host)
//!   │     ├─ Err(RelativeUrlWithoutBase) → input has no scheme: from_connection_string(input)
//!   │     └─ Err(other)                 → AddressError::InvalidUri (never re-tried)
//! ```

use std::time::Duration;

use url::Url;

use crate::error::AddressError;

const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Where a transport connects, plus connection-level options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSettings {
    address: Url,
    operation_timeout: Duration,
    key_name: Option<String>,
    has_key: bool,
}

impl HostSettings {
    /// Resolves `input` as an address URI, falling back to a connection string
    /// only when `input` is not a URI at all.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let input = input.trim();
        match Url::parse(input) {
            Ok(url) => Self::from_url(&url),
            Err(url::ParseError::RelativeUrlWithoutBase) => Self::from_connection_string(input),
            Err(e) => Err(AddressError::InvalidUri {
                input: input.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Builds settings from a host address; the path becomes the scope.
    pub fn from_url(url: &Url) -> Result<Self, AddressError> {
        if url.host_str().is_none_or(str::is_empty) {
            return Err(AddressError::MissingHost {
                input: url.to_string(),
            });
        }

        let scope = url.path().trim_matches('/').to_string();
        let mut address = url.clone();
        address.set_query(None);
        address.set_fragment(None);
        if scope.is_empty() {
            address.set_path("/");
        } else {
            address.set_path(&format!("/{scope}/"));
        }

        Ok(Self {
            address,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            key_name: None,
            has_key: false,
        })
    }

    /// Parses a `Key=Value;Key=Value` connection string.
    ///
    /// Recognized keys (case-insensitive): `Endpoint` (required),
    /// `SharedAccessKeyName`, `SharedAccessKey`, `OperationTimeout`
    /// (`hh:mm:ss` or whole seconds). Other keys are ignored.
    pub fn from_connection_string(input: &str) -> Result<Self, AddressError> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut has_key = false;
        let mut operation_timeout = DEFAULT_OPERATION_TIMEOUT;

        for segment in input.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let Some((key, value)) = segment.split_once('=') else {
                return Err(AddressError::InvalidConnectionString {
                    reason: format!("segment '{segment}' is not a key=value pair"),
                });
            };
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.to_string()),
                "sharedaccesskeyname" => key_name = Some(value.to_string()),
                "sharedaccesskey" => has_key = !value.is_empty(),
                "operationtimeout" => operation_timeout = parse_timeout(value)?,
                _ => {}
            }
        }

        let endpoint = endpoint.ok_or_else(|| AddressError::InvalidConnectionString {
            reason: "missing Endpoint".to_string(),
        })?;
        let url = Url::parse(&endpoint).map_err(|e| AddressError::InvalidConnectionString {
            reason: format!("Endpoint '{endpoint}': {e}"),
        })?;

        let mut settings = Self::from_url(&url)?;
        settings.operation_timeout = operation_timeout;
        settings.key_name = key_name;
        settings.has_key = has_key;
        Ok(settings)
    }

    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Normalized host address (`scheme://host[:port]/scope/`).
    pub fn address(&self) -> &Url {
        &self.address
    }

    pub fn scheme(&self) -> &str {
        self.address.scheme()
    }

    pub fn host(&self) -> &str {
        self.address.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> Option<u16> {
        self.address.port()
    }

    /// Scope segment of the address (virtual host, namespace path), possibly empty.
    pub fn scope(&self) -> &str {
        self.address.path().trim_matches('/')
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Shared access key name from a connection string.
    pub fn key_name(&self) -> Option<&str> {
        self.key_name.as_deref()
    }

    /// True if a connection string carried a shared access key.
    pub fn has_credentials(&self) -> bool {
        self.has_key
    }

    /// Address of `queue` on this host: `scheme://host/scope/queue`.
    pub fn queue_address(&self, queue: &str) -> Result<Url, AddressError> {
        let mut url = self.address.clone();
        url.path_segments_mut()
            .map_err(|()| AddressError::InvalidUri {
                input: self.address.to_string(),
                reason: "address cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .push(queue);
        Ok(url)
    }
}

fn parse_timeout(value: &str) -> Result<Duration, AddressError> {
    let invalid = || AddressError::InvalidConnectionString {
        reason: format!("OperationTimeout '{value}' is not hh:mm:ss or seconds"),
    };

    if let Ok(secs) = value.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let parts: Vec<&str> = value.split(':').collect();
    let [h, m, s] = parts.as_slice() else {
        return Err(invalid());
    };
    let h: u64 = h.parse().map_err(|_| invalid())?;
    let m: u64 = m.parse().map_err(|_| invalid())?;
    let s: f64 = s.parse().map_err(|_| invalid())?;
    if m >= 60 || !(0.0..60.0).contains(&s) {
        return Err(invalid());
    }
    h.checked_mul(3600)
        .and_then(|secs| secs.checked_add(m * 60))
        .and_then(|secs| Duration::from_secs(secs).checked_add(Duration::from_secs_f64(s)))
        .ok_or_else(invalid)
}
