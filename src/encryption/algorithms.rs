//! Standard security handler key derivation, revision 2 (40-bit RC4).

use md5::{Digest, Md5};

use super::rc4::rc4_crypt;

/// Padding string used to extend passwords to 32 bytes.
pub(crate) const PADDING: &[u8; 32] = b"\x28\xBF\x4E\x5E\x4E\x75\x8A\x41\
                                        \x64\x00\x4E\x56\xFF\xFA\x01\x08\
                                        \x2E\x2E\x00\xB6\xD0\x68\x3E\x80\
                                        \x2F\x0C\xA9\xFE\x64\x53\x69\x7A";

/// Key length for revision 2, in bytes.
pub(crate) const KEY_LENGTH: usize = 5;

/// Pad or truncate a password to exactly 32 bytes.
pub(crate) fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PADDING[..32 - len]);
    padded
}

/// Compute the `/O` entry: the padded user password encrypted with a key
/// derived from the owner password.
pub(crate) fn compute_owner_value(user: &[u8], owner: &[u8]) -> Vec<u8> {
    let digest = Md5::digest(pad_password(owner));
    rc4_crypt(&digest[..KEY_LENGTH], &pad_password(user))
}

/// Compute the document encryption key from the user password, `/O`, the
/// permission word and the first element of the trailer `/ID`.
pub(crate) fn compute_encryption_key(
    user: &[u8],
    owner_value: &[u8],
    permissions: i32,
    file_id: &[u8],
) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(pad_password(user));
    hasher.update(owner_value);
    hasher.update(permissions.to_le_bytes());
    hasher.update(file_id);
    hasher.finalize()[..KEY_LENGTH].to_vec()
}

/// Compute the `/U` entry: the padding string encrypted with the document key.
pub(crate) fn compute_user_value(key: &[u8]) -> Vec<u8> {
    rc4_crypt(key, PADDING)
}

/// Derive the key for one indirect object.
///
/// The low three bytes of the object number and the two generation bytes are
/// appended to the document key before hashing. The result is `n + 5` bytes.
pub(crate) fn object_key(key: &[u8], obj_num: u32, gen_num: u16) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(key);
    hasher.update(&obj_num.to_le_bytes()[..3]);
    hasher.update(gen_num.to_le_bytes());
    let hash = hasher.finalize();
    hash[..(key.len() + 5).min(16)].to_vec()
}
