//! Encrypted payload and its HTML attribute encoding.

use std::fmt;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use quill_markup::Element;

use crate::error::PayloadError;

pub const CIPHER_ATTR: &str = "data-cipher";
pub const IV_ATTR: &str = "data-iv";
pub const SALT_ATTR: &str = "data-salt";
/// Excludes the element from the search index.
pub const SEARCH_IGNORE_ATTR: &str = "data-pagefind-ignore";

pub const IV_LEN: usize = 12;
pub const SALT_LEN: usize = 16;

/// Ciphertext (with GCM tag) plus the IV and salt needed to decrypt it.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub cipher: Vec<u8>,
    pub iv: [u8; IV_LEN],
    pub salt: [u8; SALT_LEN],
}

impl EncryptedPayload {
    /// Write the payload as base64 attributes and mark the element as
    /// excluded from search.
    pub fn write_attrs(&self, element: &mut Element) {
        element.set_attr(CIPHER_ATTR, BASE64_STANDARD.encode(&self.cipher));
        element.set_attr(IV_ATTR, BASE64_STANDARD.encode(self.iv));
        element.set_attr(SALT_ATTR, BASE64_STANDARD.encode(self.salt));
        element.set_attr(SEARCH_IGNORE_ATTR, "all");
    }

    /// Read a payload back from an element's attributes.
    pub fn from_element(element: &Element) -> Result<Self, PayloadError> {
        let cipher = decode_attr(element, CIPHER_ATTR)?;
        let iv = decode_fixed(element, IV_ATTR)?;
        let salt = decode_fixed(element, SALT_ATTR)?;
        Ok(Self { cipher, iv, salt })
    }
}

impl fmt::Debug for EncryptedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedPayload")
            .field("cipher_len", &self.cipher.len())
            .finish_non_exhaustive()
    }
}

fn decode_attr(element: &Element, attr: &'static str) -> Result<Vec<u8>, PayloadError> {
    let value = element.attr(attr).ok_or(PayloadError::Missing(attr))?;
    BASE64_STANDARD
        .decode(value.trim())
        .map_err(|source| PayloadError::Base64 { attr, source })
}

fn decode_fixed<const N: usize>(element: &Element, attr: &'static str) -> Result<[u8; N], PayloadError> {
    let bytes = decode_attr(element, attr)?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| PayloadError::Length {
        attr,
        expected: N,
        actual,
    })
}
