//! Encryption handler used while writing a protected document.

use super::algorithms;
use super::rc4;
use super::Permissions;
use crate::object::{dict, Dict, Object};

/// Encrypts strings and streams of each indirect object as it is written.
///
/// Holds the values of the standard security handler (`/O`, `/U`, `/P`)
/// together with the derived document key.
#[derive(Debug, Clone)]
pub struct EncryptionWriteHandler {
    encryption_key: Vec<u8>,
    file_id: Vec<u8>,
    owner_value: Vec<u8>,
    user_value: Vec<u8>,
    permissions: i32,
}

impl EncryptionWriteHandler {
    /// Build the handler from passwords and granted permissions, with an
    /// empty file identifier.
    ///
    /// An empty owner password is replaced by a random one.
    pub fn new(user_password: &str, owner_password: &str, granted: Permissions) -> Self {
        Self::with_file_id(user_password, owner_password, granted, &[])
    }

    /// Build the handler for a document whose trailer `/ID` starts with
    /// `file_id`.
    pub fn with_file_id(
        user_password: &str,
        owner_password: &str,
        granted: Permissions,
        file_id: &[u8],
    ) -> Self {
        let owner = if owner_password.is_empty() {
            uuid::Uuid::new_v4().simple().to_string()
        } else {
            owner_password.to_string()
        };
        let protection = 192u8 | granted.bits();
        let permissions = -(((protection ^ 255) as i32) + 1);

        let owner_value = algorithms::compute_owner_value(user_password.as_bytes(), owner.as_bytes());
        let encryption_key =
            algorithms::compute_encryption_key(user_password.as_bytes(), &owner_value, permissions, file_id);
        let user_value = algorithms::compute_user_value(&encryption_key);

        log::debug!("Standard security handler ready, P = {}", permissions);
        Self {
            encryption_key,
            file_id: file_id.to_vec(),
            owner_value,
            user_value,
            permissions,
        }
    }

    /// The `/P` permission word.
    pub fn permissions(&self) -> i32 {
        self.permissions
    }

    /// The file identifier the key was derived with.
    pub fn file_id(&self) -> &[u8] {
        &self.file_id
    }

    /// The document encryption key.
    pub fn key(&self) -> &[u8] {
        &self.encryption_key
    }

    /// Derive the RC4 key of one object.
    pub fn object_key(&self, obj_num: u32, gen_num: u16) -> Vec<u8> {
        algorithms::object_key(&self.encryption_key, obj_num, gen_num)
    }

    /// Encrypt a string or stream payload belonging to `obj_num`.
    pub fn encrypt(&self, data: &[u8], obj_num: u32, gen_num: u16) -> Vec<u8> {
        rc4::rc4_crypt(&self.object_key(obj_num, gen_num), data)
    }

    /// The `/Encrypt` dictionary. It is written without encryption.
    pub fn encrypt_dict(&self) -> Dict {
        dict([
            ("Filter", Object::name("Standard")),
            ("V", Object::Integer(1)),
            ("R", Object::Integer(2)),
            ("O", Object::HexString(self.owner_value.clone())),
            ("U", Object::HexString(self.user_value.clone())),
            ("P", Object::Integer(self.permissions as i64)),
        ])
    }
}
