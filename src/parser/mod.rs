pub mod primitive_parser;
pub mod smf_parser;
pub(crate) mod smf_parser_tests;
pub mod track_parser;
