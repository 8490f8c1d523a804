//! Answers VoIP calls over RTP and drives a spoken conversation with
//! speech-to-text, LLM and text-to-speech collaborators.

pub mod ai;
pub mod config;
pub mod error;
pub mod logging;
pub mod media;
pub mod ports;
pub mod rtp;
pub mod sdp;
pub mod session;
