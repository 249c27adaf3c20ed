pub mod decode;
pub mod encode;
pub mod manifest;
pub mod simulate;
