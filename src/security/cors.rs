//! CORS policy attached to a single router.
//!
//! # Responsibilities
//! - Validate the requesting Origin against the allowed set
//! - Answer preflight (`OPTIONS`) requests directly
//! - Decorate ordinary responses with `Access-Control-Allow-*` headers
//!
//! # Design Decisions
//! - Exact origin matching; `*` allows any origin but never with credentials
//! - A disallowed Origin gets no CORS headers at all (the browser enforces)
//! - Only one origin is ever echoed back, never a list
//! - `always_on` decorates requests that carry no Origin header too

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use url::Url;

/// CORS configuration error, raised when a policy is built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorsError {
    #[error("wildcard origin '*' cannot be combined with allow_credentials")]
    WildcardWithCredentials,

    #[error("at least one allowed origin is required")]
    NoOrigins,

    #[error("invalid origin '{0}': expected scheme://host[:port]")]
    InvalidOrigin(String),

    #[error("invalid header name '{0}'")]
    InvalidHeader(String),

    #[error("invalid method '{0}'")]
    InvalidMethod(String),
}

#[derive(Debug, Clone)]
enum AllowedOrigins {
    Any,
    Exact(Vec<String>),
}

impl AllowedOrigins {
    fn is_allowed(&self, origin: &str) -> bool {
        match self {
            AllowedOrigins::Any => true,
            AllowedOrigins::Exact(origins) => origins.iter().any(|o| o == origin),
        }
    }
}

/// Immutable CORS policy.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: AllowedOrigins,
    allowed_methods: Vec<Method>,
    allowed_headers: Vec<HeaderName>,
    allow_credentials: bool,
    max_age_secs: Option<u64>,
    always_on: bool,
}

impl CorsPolicy {
    pub fn builder() -> CorsPolicyBuilder {
        CorsPolicyBuilder::default()
    }

    /// The value to send as `Access-Control-Allow-Origin`, if any.
    fn allow_origin_value(&self, headers: &HeaderMap) -> Option<HeaderValue> {
        match headers.get(header::ORIGIN) {
            Some(origin) => {
                let origin_str = origin.to_str().ok()?;
                if !self.origins.is_allowed(origin_str) {
                    tracing::debug!(origin = %origin_str, "Origin not allowed by CORS policy");
                    return None;
                }
                match self.origins {
                    AllowedOrigins::Any => Some(HeaderValue::from_static("*")),
                    AllowedOrigins::Exact(_) => Some(origin.clone()),
                }
            }
            None if self.always_on => match &self.origins {
                AllowedOrigins::Any => Some(HeaderValue::from_static("*")),
                AllowedOrigins::Exact(origins) => {
                    origins.first().and_then(|o| HeaderValue::from_str(o).ok())
                }
            },
            None => None,
        }
    }

    /// True if this request should be answered as a preflight: an `OPTIONS`
    /// carrying both `Origin` and `Access-Control-Request-Method`. A bare
    /// `OPTIONS` is an ordinary request, even in `always_on` mode.
    pub fn is_preflight(method: &Method, headers: &HeaderMap) -> bool {
        method == Method::OPTIONS
            && headers.contains_key(header::ORIGIN)
            && headers.contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
    }

    /// Answer a preflight request without involving any handler.
    pub fn preflight_response(&self, headers: &HeaderMap) -> Response {
        let mut response = StatusCode::NO_CONTENT.into_response();
        let Some(origin) = self.allow_origin_value(headers) else {
            return response;
        };

        let out = response.headers_mut();
        out.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        if !self.allowed_methods.is_empty() {
            let methods = join(self.allowed_methods.iter().map(Method::as_str));
            if let Ok(v) = HeaderValue::from_str(&methods) {
                out.insert(header::ACCESS_CONTROL_ALLOW_METHODS, v);
            }
        }
        if !self.allowed_headers.is_empty() {
            let names = join(self.allowed_headers.iter().map(HeaderName::as_str));
            if let Ok(v) = HeaderValue::from_str(&names) {
                out.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, v);
            }
        }
        if self.allow_credentials {
            out.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        if let Some(max_age) = self.max_age_secs {
            out.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age));
        }
        out.append(header::VARY, HeaderValue::from_static("Origin"));
        response
    }

    /// Add CORS headers to a non-preflight response.
    pub fn apply(&self, request_headers: &HeaderMap, response: &mut Response) {
        let Some(origin) = self.allow_origin_value(request_headers) else {
            return;
        };
        let out = response.headers_mut();
        out.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        if self.allow_credentials {
            out.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        out.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

/// Builder for [`CorsPolicy`]; `build` validates the combination.
#[derive(Debug, Default, Clone)]
pub struct CorsPolicyBuilder {
    origins: Vec<String>,
    methods: Vec<Method>,
    headers: Vec<String>,
    allow_credentials: bool,
    max_age_secs: Option<u64>,
    always_on: bool,
}

impl CorsPolicyBuilder {
    pub fn allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.origins = origins.into_iter().map(Into::into).collect();
        self
    }

    pub fn allowed_methods<I: IntoIterator<Item = Method>>(mut self, methods: I) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    pub fn allowed_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    pub fn max_age(mut self, secs: u64) -> Self {
        self.max_age_secs = Some(secs);
        self
    }

    pub fn always_on(mut self, always_on: bool) -> Self {
        self.always_on = always_on;
        self
    }

    pub fn build(self) -> Result<CorsPolicy, CorsError> {
        if self.origins.is_empty() {
            return Err(CorsError::NoOrigins);
        }

        let origins = if self.origins.iter().any(|o| o == "*") {
            if self.allow_credentials {
                return Err(CorsError::WildcardWithCredentials);
            }
            AllowedOrigins::Any
        } else {
            for origin in &self.origins {
                validate_origin(origin)?;
            }
            AllowedOrigins::Exact(self.origins)
        };

        let allowed_headers = self
            .headers
            .iter()
            .map(|h| HeaderName::from_bytes(h.as_bytes()).map_err(|_| CorsError::InvalidHeader(h.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CorsPolicy {
            origins,
            allowed_methods: self.methods,
            allowed_headers,
            allow_credentials: self.allow_credentials,
            max_age_secs: self.max_age_secs,
            always_on: self.always_on,
        })
    }
}

fn validate_origin(origin: &str) -> Result<(), CorsError> {
    let invalid = || CorsError::InvalidOrigin(origin.to_string());
    let url = Url::parse(origin).map_err(|_| invalid())?;
    let well_formed = matches!(url.scheme(), "http" | "https")
        && url.host_str().is_some()
        && url.path() == "/"
        && url.query().is_none()
        && url.fragment().is_none()
        && !origin.ends_with('/');
    if well_formed {
        Ok(())
    } else {
        Err(invalid())
    }
}
