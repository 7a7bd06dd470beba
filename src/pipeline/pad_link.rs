//! Completes the graph once the upstream stage announces its streams
//!
//! `rtspsrc` and `qtdemux` create their source pads only after playback
//! starts. Each `pad-added` is reduced to a [`PadAdded`] event and run
//! through [`decide`]; [`PadLinkResolver`] applies the decision and keeps
//! the per-pipeline link state.

use std::fmt;

use gstreamer as gst;
use tracing::{debug, error, info, warn};

use super::UpstreamKind;
use crate::error::LinkError;

/// Link progress of one pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Waiting,
    Linked,
}

/// Stage that fired `pad-added`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadOrigin {
    NetworkSource,
    Demuxer,
}

/// Media-type descriptor of a new pad
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// Caps structure name, e.g. `application/x-rtp`
    pub name: String,
    /// RTP `media` field
    pub media: Option<String>,
    /// RTP `encoding-name` field
    pub encoding_name: Option<String>,
}

impl MediaType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            media: None,
            encoding_name: None,
        }
    }

    /// RTP payload descriptor
    pub fn rtp(media: &str, encoding_name: &str) -> Self {
        Self {
            name: "application/x-rtp".to_string(),
            media: Some(media.to_string()),
            encoding_name: Some(encoding_name.to_string()),
        }
    }

    /// Read the first structure of `caps`
    pub fn from_caps(caps: &gst::CapsRef) -> Option<Self> {
        let structure = caps.structure(0)?;
        Some(Self {
            name: structure.name().to_string(),
            media: structure.get::<String>("media").ok(),
            encoding_name: structure.get::<String>("encoding-name").ok(),
        })
    }

    pub fn is_h264_video(&self) -> bool {
        match self.name.as_str() {
            "video/x-h264" => true,
            "application/x-rtp" => {
                self.media.as_deref() == Some("video")
                    && self
                        .encoding_name
                        .as_deref()
                        .is_some_and(|enc| enc.eq_ignore_ascii_case("H264"))
            }
            _ => false,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(media) = &self.media {
            write!(f, ",media={}", media)?;
        }
        if let Some(encoding) = &self.encoding_name {
            write!(f, ",encoding-name={}", encoding)?;
        }
        Ok(())
    }
}

/// One `pad-added` signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadAdded {
    pub origin: PadOrigin,
    pub pad_name: String,
    pub media: MediaType,
}

/// Sink pad a dynamic pad gets linked to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTarget {
    DepayloaderSink,
    ParserSink,
}

impl fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkTarget::DepayloaderSink => f.write_str("depay:sink"),
            LinkTarget::ParserSink => f.write_str("parse:sink"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDecision {
    /// Not H.264 video; keep waiting
    Ignore,
    Link(LinkTarget),
    /// Origin does not belong to this topology
    Reject,
    /// Target already linked; no-op
    AlreadyLinked,
}

/// Decide what to do with a new pad
pub fn decide(state: LinkState, kind: UpstreamKind, event: &PadAdded) -> LinkDecision {
    if !event.media.is_h264_video() {
        return LinkDecision::Ignore;
    }

    let target = match (&event.origin, kind) {
        (PadOrigin::NetworkSource, UpstreamKind::Network) => LinkTarget::DepayloaderSink,
        (PadOrigin::Demuxer, UpstreamKind::Container) => LinkTarget::ParserSink,
        _ => return LinkDecision::Reject,
    };

    match state {
        LinkState::Linked => LinkDecision::AlreadyLinked,
        LinkState::Waiting => LinkDecision::Link(target),
    }
}

/// What `on_pad_added` did
#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome {
    Ignored,
    Linked(LinkTarget),
    AlreadyLinked,
    Rejected,
    Failed(LinkError),
}

/// Per-pipeline link state machine
#[derive(Debug)]
pub struct PadLinkResolver {
    kind: UpstreamKind,
    state: LinkState,
}

impl PadLinkResolver {
    pub fn new(kind: UpstreamKind) -> Self {
        Self {
            kind,
            state: LinkState::Waiting,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn kind(&self) -> UpstreamKind {
        self.kind
    }

    /// Apply the decision for `event`.
    ///
    /// `target_linked` reports the live state of the target sink pad.
    /// `link` is called at most once; a refusal leaves the resolver waiting.
    pub fn on_pad_added<F>(&mut self, event: &PadAdded, target_linked: bool, link: F) -> LinkOutcome
    where
        F: FnOnce(LinkTarget) -> Result<(), String>,
    {
        match decide(self.state, self.kind, event) {
            LinkDecision::Ignore => {
                debug!(
                    "Ignoring pad {} ({}) from {:?}",
                    event.pad_name, event.media, event.origin
                );
                LinkOutcome::Ignored
            }
            LinkDecision::Reject => {
                error!(
                    "Pad {} from {:?} does not belong to a {:?} topology",
                    event.pad_name, event.origin, self.kind
                );
                LinkOutcome::Rejected
            }
            LinkDecision::AlreadyLinked => {
                debug!("Pad {} ignored, graph already linked", event.pad_name);
                LinkOutcome::AlreadyLinked
            }
            LinkDecision::Link(_) if target_linked => {
                self.state = LinkState::Linked;
                debug!("Pad {} ignored, target already linked", event.pad_name);
                LinkOutcome::AlreadyLinked
            }
            LinkDecision::Link(target) => match link(target) {
                Ok(()) => {
                    self.state = LinkState::Linked;
                    info!("Linked {} -> {}", event.pad_name, target);
                    LinkOutcome::Linked(target)
                }
                Err(reason) => {
                    let err = LinkError {
                        pad: event.pad_name.clone(),
                        target: target.to_string(),
                        reason,
                    };
                    warn!("{}", err);
                    LinkOutcome::Failed(err)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(origin: PadOrigin, media: MediaType) -> PadAdded {
        PadAdded {
            origin,
            pad_name: "recv_rtp_src_0_1_96".to_string(),
            media,
        }
    }

    #[test]
    fn test_h264_detection() {
        assert!(MediaType::new("video/x-h264").is_h264_video());
        assert!(MediaType::rtp("video", "H264").is_h264_video());
        assert!(!MediaType::rtp("audio", "MPEG4-GENERIC").is_h264_video());
        assert!(!MediaType::rtp("video", "H265").is_h264_video());
        assert!(!MediaType::new("audio/mpeg").is_h264_video());
        assert!(!MediaType::new("application/x-rtp").is_h264_video());
    }

    #[test]
    fn test_decide_routes_by_topology() {
        let rtp = event(PadOrigin::NetworkSource, MediaType::rtp("video", "H264"));
        assert_eq!(
            decide(LinkState::Waiting, UpstreamKind::Network, &rtp),
            LinkDecision::Link(LinkTarget::DepayloaderSink)
        );

        let demuxed = event(PadOrigin::Demuxer, MediaType::new("video/x-h264"));
        assert_eq!(
            decide(LinkState::Waiting, UpstreamKind::Container, &demuxed),
            LinkDecision::Link(LinkTarget::ParserSink)
        );
    }

    #[test]
    fn test_decide_rejects_foreign_origin() {
        let demuxed = event(PadOrigin::Demuxer, MediaType::new("video/x-h264"));
        assert_eq!(
            decide(LinkState::Waiting, UpstreamKind::Network, &demuxed),
            LinkDecision::Reject
        );

        let rtp = event(PadOrigin::NetworkSource, MediaType::rtp("video", "H264"));
        assert_eq!(
            decide(LinkState::Waiting, UpstreamKind::Container, &rtp),
            LinkDecision::Reject
        );
    }

    #[test]
    fn test_decide_after_link() {
        let rtp = event(PadOrigin::NetworkSource, MediaType::rtp("video", "H264"));
        assert_eq!(
            decide(LinkState::Linked, UpstreamKind::Network, &rtp),
            LinkDecision::AlreadyLinked
        );
    }

    #[test]
    fn test_same_pad_twice_links_once() {
        let mut resolver = PadLinkResolver::new(UpstreamKind::Network);
        let rtp = event(PadOrigin::NetworkSource, MediaType::rtp("video", "H264"));
        let mut calls = 0;

        let first = resolver.on_pad_added(&rtp, false, |_| {
            calls += 1;
            Ok(())
        });
        let second = resolver.on_pad_added(&rtp, true, |_| {
            calls += 1;
            Ok(())
        });

        assert_eq!(first, LinkOutcome::Linked(LinkTarget::DepayloaderSink));
        assert_eq!(second, LinkOutcome::AlreadyLinked);
        assert_eq!(calls, 1);
        assert_eq!(resolver.state(), LinkState::Linked);
    }

    #[test]
    fn test_live_linked_target_is_not_relinked() {
        let mut resolver = PadLinkResolver::new(UpstreamKind::Container);
        let demuxed = event(PadOrigin::Demuxer, MediaType::new("video/x-h264"));

        let outcome = resolver.on_pad_added(&demuxed, true, |_| panic!("must not link"));

        assert_eq!(outcome, LinkOutcome::AlreadyLinked);
        assert_eq!(resolver.state(), LinkState::Linked);
    }

    #[test]
    fn test_link_failure_keeps_waiting() {
        let mut resolver = PadLinkResolver::new(UpstreamKind::Network);
        let rtp = event(PadOrigin::NetworkSource, MediaType::rtp("video", "H264"));

        let outcome = resolver.on_pad_added(&rtp, false, |_| Err("WrongFormat".to_string()));
        match outcome {
            LinkOutcome::Failed(err) => {
                assert_eq!(err.target, "depay:sink");
                assert_eq!(err.reason, "WrongFormat");
            }
            other => panic!("Expected failure, got {:?}", other),
        }
        assert_eq!(resolver.state(), LinkState::Waiting);

        let retry = resolver.on_pad_added(&rtp, false, |_| Ok(()));
        assert_eq!(retry, LinkOutcome::Linked(LinkTarget::DepayloaderSink));
    }

    #[test]
    fn test_audio_pad_leaves_resolver_waiting() {
        let mut resolver = PadLinkResolver::new(UpstreamKind::Network);
        let audio = event(
            PadOrigin::NetworkSource,
            MediaType::rtp("audio", "MPEG4-GENERIC"),
        );

        let outcome = resolver.on_pad_added(&audio, false, |_| panic!("must not link"));

        assert_eq!(outcome, LinkOutcome::Ignored);
        assert_eq!(resolver.state(), LinkState::Waiting);
    }
}
