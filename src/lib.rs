//! Pitch practice: sing along with a song while a live pitch trace is plotted
//! against the pitch curve of the song's isolated vocals.
//!
//! # Modules
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`audio`] | microphone capture, playback output, WAV recording, ring buffer |
//! | [`pitch`] | pitch estimators, estimation schedule, reference curves |
//! | [`worker`] | capture / playback worker threads and their state machines |
//! | [`pipeline`] | live comparison controller and chart data |
//! | [`prepare`] | URL validation, download, stem separation, reference computation |
//! | [`config`] | TOML settings and storage paths |
//! | [`app`] | eframe dashboard |

pub mod app;
pub mod audio;
pub mod config;
pub mod pipeline;
pub mod pitch;
pub mod prepare;
pub mod worker;
