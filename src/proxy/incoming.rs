//! Client-facing leg.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use super::upstream::Upstream;
use super::{reject, Leg, ProxyContext, ProxyError, MESSAGE_ID_HEADER};
use crate::config::ProxyRole;
use crate::http::classify::{is_request, request_method};
use crate::http::framing::{read_body, read_header_block, FramingError};
use crate::http::headers::add_header;
use crate::observability::metrics;
use crate::resilience::timeouts::deadline;

const LEG: Leg = Leg::Incoming;

/// Serves one client connection until it closes or fails.
///
/// Each request is whitelisted (and, for an intermediary, tagged with a
/// fresh session id) before it is forwarded to the local relay. The session
/// lives until the response has been relayed back.
pub async fn serve<S>(ctx: &ProxyContext, client: S) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let timeout = ctx.timeout();
    let whitelisting = ctx.whitelisting();
    let (read_half, mut writer) = tokio::io::split(client);
    let mut reader = BufReader::new(read_half);
    let mut upstream = Upstream::new(ctx.config.relay_address(), timeout, ctx.max_header_bytes());

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

        let mut session = None;
        let head = if whitelisting {
            let split = match ctx.whitelist.split(&head) {
                Ok(split) => split,
                Err(e) => return reject(&mut writer, ctx, LEG, e.into()).await,
            };
            match ctx.config.role {
                ProxyRole::Origin => split.whitelisted,
                ProxyRole::Intermediary => {
                    let guard = ctx.sessions.open(split.withheld);
                    tracing::debug!(session_id = %guard.id(), "Session opened");
                    let tagged = add_header(&split.whitelisted, MESSAGE_ID_HEADER, guard.id());
                    session = Some(guard);
                    tagged
                }
            }
        } else {
            head
        };

        let request = match deadline(timeout, read_body(head, &mut reader, whitelisting)).await? {
            Ok(request) => request,
            Err(e) => return reject(&mut writer, ctx, LEG, ProxyError::Request(e)).await,
        };

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

        drop(session);
    }
}
