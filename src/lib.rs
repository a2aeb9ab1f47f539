//! picweave
//!
//! Replaces markdown-style image links (`![alt](url)`) embedded in Word
//! document text with the referenced images, downloaded and sized to fit
//! their container, while the surrounding text is preserved in place.
//!
//! This library provides:
//! - `segment`: link scanning and text/image segmentation
//! - `fit`: aspect-preserving size fitting in EMU
//! - `fetch`: image download and dimension probing
//! - `docx`: the DOCX package collaborator
//! - `rewrite`: paragraph rebuild and document walking
//! - `pipeline`: the batch driver shared by both binaries
//!
//! Binaries:
//! - `picweave`: batch CLI
//! - `picweave-ui`: file-picker GUI with progress and log pane

pub mod docx;
pub mod fetch;
pub mod fit;
pub mod pipeline;
pub mod rewrite;
pub mod segment;
