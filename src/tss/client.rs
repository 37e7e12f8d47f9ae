use std::time::Duration;

use log::{debug, info};

use crate::error::{Error, ErrorKind, Result};
use crate::ticket::Ticket;

use super::SigningRequest;

/// Default signing authority endpoint.
pub const TSS_ENDPOINT: &str = "https://gs.apple.com/TSS/controller?action=2";

const STATUS_FIELD: &str = "STATUS=";
const MESSAGE_FIELD: &str = "MESSAGE=";
const REQUEST_STRING_FIELD: &str = "REQUEST_STRING=";

/// A remote service that turns a [SigningRequest] into a per-device
/// [Ticket].
///
/// No retry policy lives at this layer; callers decide whether a
/// `SigningUnavailable` failure is worth another attempt.
pub trait SigningAuthority {
    fn submit(&self, request: &SigningRequest) -> Result<Ticket>;
}

/// HTTP client for the signing authority.
pub struct TssClient {
    agent: ureq::Agent,
    endpoint: String,
}

impl TssClient {
    /// Creates a client against the default endpoint.
    pub fn new() -> Self {
        Self::with_endpoint(TSS_ENDPOINT)
    }

    /// Creates a client against an alternate endpoint (e.g. a caching
    /// proxy).
    pub fn with_endpoint<S>(endpoint: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(60))
                .build(),
            endpoint: endpoint.into(),
        }
    }
}

impl Default for TssClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SigningAuthority for TssClient {
    fn submit(&self, request: &SigningRequest) -> Result<Ticket> {
        let body = request.to_xml()?;

        info!("Sending signing request to {}", self.endpoint);
        let response = self
            .agent
            .post(&self.endpoint)
            .set("Cache-Control", "no-cache")
            .set("Content-Type", "text/xml; charset=\"utf-8\"")
            .set("User-Agent", "InetURL/1.0")
            .send_bytes(&body)?;

        let text = response.into_string().map_err(|err| {
            Error::new(
                ErrorKind::SigningUnavailable,
                format!("unable to read the signing response: {err}"),
            )
        })?;
        debug!("signing response: {} bytes", text.len());

        parse_response(&text)
    }
}

/// Parses the authority's form-encoded response envelope:
/// `STATUS=<n>&MESSAGE=<text>&REQUEST_STRING=<xml plist>`.
fn parse_response(body: &str) -> Result<Ticket> {
    // The ticket plist may itself contain `&`, so split only the
    // envelope prefix.
    let (envelope, ticket_xml) = match body.find(REQUEST_STRING_FIELD) {
        Some(idx) => (
            &body[..idx],
            Some(&body[idx + REQUEST_STRING_FIELD.len()..]),
        ),
        None => (body, None),
    };

    let mut status = None;
    let mut message = None;
    for field in envelope.split('&') {
        if let Some(value) = field.strip_prefix(STATUS_FIELD) {
            status = value.trim().parse::<i64>().ok();
        } else if let Some(value) = field.strip_prefix(MESSAGE_FIELD) {
            message = Some(value.trim());
        }
    }

    let status = status.ok_or_else(|| {
        Error::new(
            ErrorKind::SigningUnavailable,
            "malformed signing response: no STATUS field",
        )
    })?;

    if status != 0 {
        return Err(Error::new(
            ErrorKind::SigningRejected,
            format!(
                "signing authority refused the request, status: {status}, message: {}",
                message.unwrap_or("(none)")
            ),
        ));
    }

    let xml = ticket_xml.ok_or_else(|| {
        Error::new(
            ErrorKind::SigningRejected,
            "signing authority reported success without a ticket",
        )
    })?;

    Ticket::parse(xml.trim().as_bytes()).map_err(|err| {
        Error::new(
            ErrorKind::SigningRejected,
            format!("unusable ticket payload: {}", err.message()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use plist::{Dictionary, Value};

    fn ticket_xml() -> String {
        let mut entry = Dictionary::new();
        entry.insert("Path".into(), Value::String("kernelcache.release".into()));
        entry.insert("Blob".into(), Value::Data(vec![0xaa, 0xbb]));

        let mut dict = Dictionary::new();
        dict.insert("KernelCache".into(), Value::Dictionary(entry));

        let mut out = Vec::new();
        plist::to_writer_xml(&mut out, &dict).expect("serialize ticket");
        String::from_utf8(out).expect("utf-8 plist")
    }

    #[test]
    fn test_parse_response_success() -> Result<()> {
        let body = format!("STATUS=0&MESSAGE=SUCCESS&REQUEST_STRING={}", ticket_xml());
        let ticket = parse_response(&body)?;

        let entry = ticket.entry("KernelCache")?;
        assert_eq!(entry.path, "kernelcache.release");
        assert_eq!(entry.blob, [0xaa, 0xbb]);

        Ok(())
    }

    #[test]
    fn test_parse_response_rejected() {
        let err =
            parse_response("STATUS=94&MESSAGE=This device isn't eligible for the requested build.")
                .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SigningRejected);
        assert!(err.message().contains("94"));
    }

    #[test]
    fn test_parse_response_malformed() {
        let err = parse_response("<html>bad gateway</html>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SigningUnavailable);

        let err = parse_response("STATUS=0&MESSAGE=SUCCESS").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SigningRejected);
    }
}
