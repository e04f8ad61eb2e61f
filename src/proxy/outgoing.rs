//! Relay-facing leg.
//!
//! Accepts the relay's own outbound connections, restores the headers the
//! incoming leg withheld, and forwards to the next hop.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use super::upstream::Upstream;
use super::{reject, CorrelationError, Leg, ProxyContext, ProxyError, MESSAGE_ID_HEADER};
use crate::http::classify::{is_request, request_method};
use crate::http::framing::{read_body, read_header_block, FramingError};
use crate::http::headers::{field_values, remove_header, Occurrence};
use crate::observability::metrics;
use crate::resilience::timeouts::deadline;
use crate::session::SessionTable;
use crate::whitelist::join;

const LEG: Leg = Leg::Outgoing;

/// Claims the session named by the request's `X-Message-ID` and merges its
/// withheld lines back in. The correlation header itself is removed.
pub fn rejoin(sessions: &SessionTable, request: &[u8]) -> Result<Vec<u8>, CorrelationError> {
    let id = match field_values(request, MESSAGE_ID_HEADER).as_slice() {
        [] => return Err(CorrelationError::MissingId),
        [id] => String::from_utf8_lossy(id).into_owned(),
        ids => return Err(CorrelationError::DuplicateId(ids.len())),
    };

    let request = remove_header(request, MESSAGE_ID_HEADER, Occurrence::All);
    let session = sessions
        .take(&id)
        .ok_or(CorrelationError::UnknownSession(id))?;
    tracing::debug!(session_id = %session.id, "Session claimed");

    Ok(join(&request, &session.withheld))
}

/// Serves one relay connection until it closes or fails.
///
/// Correlation failures drop the connection without writing a response.
pub async fn serve<S>(ctx: &ProxyContext, relay: S) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let timeout = ctx.timeout();
    let whitelisting = ctx.whitelisting();
    let (read_half, mut writer) = tokio::io::split(relay);
    let mut reader = BufReader::new(read_half);
    let mut upstream = Upstream::new(
        ctx.config.relay.next_hop_address.clone(),
        timeout,
        ctx.max_header_bytes(),
    );

    loop {
        let head = match deadline(timeout, read_header_block(&mut reader, ctx.max_header_bytes())).await? {
            Ok(head) => head,
            Err(e) if e.is_disconnect() => return Ok(()),
            Err(e) => return reject(&mut writer, ctx, LEG, ProxyError::Request(e)).await,
        };
        if !is_request(&head) {
            return reject(&mut writer, ctx, LEG, ProxyError::Request(FramingError::MalformedHead)).await;
        }
        let method = request_method(&head).map(<[u8]>::to_vec);

        let mut request = match deadline(timeout, read_body(head, &mut reader, whitelisting)).await? {
            Ok(request) => request,
            Err(e) => return reject(&mut writer, ctx, LEG, ProxyError::Request(e)).await,
        };

        if whitelisting {
            request = rejoin(&ctx.sessions, &request)?;
        }

        metrics::record_request(LEG.as_str());
        let response = upstream
            .exchange(&request, method.as_deref(), whitelisting)
            .await?;

        deadline(timeout, async {
            writer.write_all(&response).await?;
            writer.flush().await
        })
        .await?
        .map_err(ProxyError::ClientIo)?;
    }
}
