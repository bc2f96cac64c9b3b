//! Document protection (standard security handler, 40-bit RC4).
//!
//! Protection follows the classic revision 2 scheme:
//!
//! - `/O` is the padded user password encrypted with the MD5 of the owner password
//! - the document key is MD5(user padded + `/O` + `/P` little-endian), first 5 bytes
//! - `/U` is the padding string encrypted with the document key
//! - each object is encrypted with MD5(key + object number + generation)
//!
//! Streams are compressed first and encrypted afterwards; the
//! [`ObjectSerializer`](crate::writer::ObjectSerializer) receives already
//! filtered stream payloads and only applies the cipher.

mod algorithms;
mod rc4;
mod write_handler;

pub use rc4::rc4_crypt;
pub use write_handler::EncryptionWriteHandler;

use bitflags::bitflags;

bitflags! {
    /// Actions granted to a reader who opens the document with the user password.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u8 {
        /// Print the document
        const PRINT = 4;
        /// Modify the contents
        const MODIFY = 8;
        /// Copy or extract text and graphics
        const COPY = 16;
        /// Add or modify annotations and fill forms
        const ANNOT_FORMS = 32;
    }
}
