pub(crate) mod cursor_ext;
