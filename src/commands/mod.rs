pub mod pdf_import;
