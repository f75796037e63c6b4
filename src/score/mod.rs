pub mod note_format;
pub mod score_encoder;
pub mod score_writer;
