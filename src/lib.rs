//! Scripted browser playback for narrated product demos.
//!
//! A [`spec::DemoSpec`] is played against a [`playback::BrowserDriver`],
//! producing an event log that the [`timeline`] builder and the
//! [`narration`] mixer turn into a render timeline and a narration track.

pub mod capture;
pub mod narration;
pub mod pipeline;
pub mod playback;
pub mod spec;
pub mod timeline;
