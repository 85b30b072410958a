pub mod lwo;
