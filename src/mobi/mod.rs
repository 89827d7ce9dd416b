//! Classic MOBI6 (Mobipocket) container writer.
//!
//! Each sub-module owns one stage of the pipeline described in the crate's
//! top-level docs: [`vwi`] (variable-width integers), [`writer_serializer`]
//! (B), [`writer_textrecords`] (C), [`writer_pagebreaks`] (D),
//! [`writer_toc`] (E), [`writer_ctoc`] (F), [`writer_htmlrecords`] (G),
//! [`writer_tbs`] (H), [`writer_indx`] (I), [`writer_record0`] (J), wired
//! together by [`writer`], the PalmDB-framing orchestrator.

pub mod mobi_lang;
pub mod palmdoc;
pub mod vwi;
pub mod writer;
pub mod writer_config;
pub mod writer_ctoc;
pub mod writer_htmlrecords;
pub mod writer_indx;
pub mod writer_model;
pub mod writer_pagebreaks;
pub mod writer_record0;
pub mod writer_serializer;
pub mod writer_tbs;
pub mod writer_textrecords;
pub mod writer_toc;

pub use writer::write_document;
