mod walk;

pub use walk::collect_image_files;
