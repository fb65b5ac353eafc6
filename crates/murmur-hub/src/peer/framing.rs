use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc;

/// Separator between the sender tag and the message body.
const TAG_SEPARATOR: &[u8] = b" :\t";

/// Tag an inbound message with its sender and neutralize line breaks.
///
/// Produces `"<label> :\t<message>"` with every `\n` replaced by a space
/// and surrounding ASCII whitespace trimmed. Newlines are the separator the
/// writer uses when coalescing, so a peer must not be able to inject them.
///
/// ```rust
/// use murmur_hub::tag_message;
///
/// let tagged = tag_message("10.0.0.1:5", b"hi\n there ");
/// assert_eq!(&tagged[..], b"10.0.0.1:5 :\thi  there");
/// ```
pub fn tag_message(label: &str, message: &[u8]) -> Bytes {
    let mut tagged = Vec::with_capacity(label.len() + TAG_SEPARATOR.len() + message.len());
    tagged.extend_from_slice(label.as_bytes());
    tagged.extend_from_slice(TAG_SEPARATOR);
    tagged.extend_from_slice(message);

    for byte in tagged.iter_mut() {
        if *byte == b'\n' {
            *byte = b' ';
        }
    }

    Bytes::copy_from_slice(tagged.trim_ascii())
}

/// Join `first` with every message queued at this instant, newline-separated.
///
/// Only messages already in the queue when this is called are taken;
/// anything arriving afterwards waits for the next frame.
pub fn coalesce(first: Bytes, outbound: &mut mpsc::Receiver<Bytes>) -> Bytes {
    let pending = outbound.len();
    if pending == 0 {
        return first;
    }

    let mut frame = BytesMut::with_capacity(first.len() * (pending + 1));
    frame.extend_from_slice(&first);
    for _ in 0..pending {
        let Ok(next) = outbound.try_recv() else {
            break;
        };
        frame.put_u8(b'\n');
        frame.extend_from_slice(&next);
    }
    frame.freeze()
}

/// System notice broadcast when a peer joins.
pub(crate) fn join_notice(label: &str) -> String {
    format!("Server message :\t{label} just joined.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_replaces_newlines_then_trims() {
        let tagged = tag_message("10.0.0.1:5", b"hi\n there ");
        assert_eq!(&tagged[..], b"10.0.0.1:5 :\thi  there");
    }

    #[test]
    fn tag_collapses_multiline_forgery() {
        let tagged = tag_message("alice", b"hello\nbob :\tI am bob\n");
        assert_eq!(&tagged[..], b"alice :\thello bob :\tI am bob");
        assert!(!tagged.contains(&b'\n'));
    }

    #[test]
    fn tag_empty_message_keeps_tag() {
        let tagged = tag_message("alice", b"   ");
        assert_eq!(&tagged[..], b"alice :");
    }

    #[test]
    fn tag_keeps_inner_whitespace() {
        let tagged = tag_message("alice", b"\t a  b \r\n");
        assert_eq!(&tagged[..], b"alice :\t\t a  b");
    }

    #[test]
    fn join_notice_format() {
        assert_eq!(
            join_notice("10.0.0.1:5"),
            "Server message :\t10.0.0.1:5 just joined."
        );
    }

    #[tokio::test]
    async fn coalesce_single_message_is_untouched() {
        let (_tx, mut rx) = mpsc::channel::<Bytes>(4);
        let frame = coalesce(Bytes::from_static(b"only"), &mut rx);
        assert_eq!(frame, "only");
    }

    #[tokio::test]
    async fn coalesce_drains_queued_in_order() {
        let (tx, mut rx) = mpsc::channel::<Bytes>(8);
        for msg in ["one", "two", "three", "four"] {
            tx.try_send(Bytes::from(msg)).unwrap();
        }

        let first = rx.recv().await.unwrap();
        let frame = coalesce(first, &mut rx);
        assert_eq!(frame, "one\ntwo\nthree\nfour");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn coalesce_stops_at_snapshot() {
        let (tx, mut rx) = mpsc::channel::<Bytes>(8);
        tx.try_send(Bytes::from("a")).unwrap();
        tx.try_send(Bytes::from("b")).unwrap();

        let first = rx.recv().await.unwrap();
        let frame = coalesce(first, &mut rx);
        tx.try_send(Bytes::from("c")).unwrap();

        assert_eq!(frame, "a\nb");
        assert_eq!(rx.recv().await.unwrap(), "c");
    }
}
