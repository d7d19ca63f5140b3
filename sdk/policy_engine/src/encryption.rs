//! # Encryption Settings
//!
//! Encryption mode of a copy: plain text, preserved from the source copy,
//! re-encrypted on the copy, or encrypted on the network only. The mode is
//! spread across `copyFlags`, `extendedFlags` and the `dataEncryption` block.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{require_non_empty, ValidationError};
use crate::properties::{CopyProperties, DataEncryption};
use crate::wire::{bit, is_set};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cipher {
    Blowfish,
    TwoFish,
    Serpent,
    Gost,
    Aes,
    Des3,
}

impl Cipher {
    pub fn wire_name(self) -> &'static str {
        match self {
            Cipher::Blowfish => "BlowFish",
            Cipher::TwoFish => "TwoFish",
            Cipher::Serpent => "Serpent",
            Cipher::Gost => "GOST",
            Cipher::Aes => "AES",
            Cipher::Des3 => "DES3",
        }
    }

    /// Key lengths the service documents for this cipher.
    pub fn key_lengths(self) -> &'static [u32] {
        match self {
            Cipher::Blowfish | Cipher::TwoFish | Cipher::Serpent | Cipher::Aes => &[128, 256],
            Cipher::Gost => &[256],
            Cipher::Des3 => &[192],
        }
    }

    pub fn supports(self, key_length: u32) -> bool {
        self.key_lengths().contains(&key_length)
    }
}

impl FromStr for Cipher {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        [
            Cipher::Blowfish,
            Cipher::TwoFish,
            Cipher::Serpent,
            Cipher::Gost,
            Cipher::Aes,
            Cipher::Des3,
        ]
        .into_iter()
        .find(|c| c.wire_name().eq_ignore_ascii_case(wanted))
        .ok_or_else(|| ValidationError::UnknownCipher(wanted.to_string()))
    }
}

impl std::fmt::Display for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Encryption mode as read back from a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMode {
    PlainText,
    PreserveSource,
    ReEncrypt,
    NetworkEncrypt,
    Unspecified,
}

/// Input to [`CopyProperties::apply_encryption`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionSettings {
    pub preserve: bool,
    pub plain_text: bool,
    pub network_encryption: bool,
    pub re_encryption: bool,
    pub cipher: Cipher,
    pub key_length: u32,
}

impl Default for EncryptionSettings {
    fn default() -> Self {
        Self {
            preserve: false,
            plain_text: false,
            network_encryption: false,
            re_encryption: false,
            cipher: Cipher::Blowfish,
            key_length: 128,
        }
    }
}

impl EncryptionSettings {
    pub fn preserve() -> Self {
        Self {
            preserve: true,
            ..Self::default()
        }
    }

    pub fn plain_text() -> Self {
        Self {
            plain_text: true,
            ..Self::default()
        }
    }

    pub fn re_encrypt(cipher: Cipher, key_length: u32) -> Self {
        Self {
            re_encryption: true,
            cipher,
            key_length,
            ..Self::default()
        }
    }

    pub fn network(cipher: Cipher, key_length: u32) -> Self {
        Self {
            network_encryption: true,
            cipher,
            key_length,
            ..Self::default()
        }
    }

    /// Whether the cipher/key-length pair is in the documented table. Only
    /// meaningful when the settings carry a cipher (re-encrypt or network).
    pub fn is_supported(&self) -> bool {
        if !(self.re_encryption || self.network_encryption) {
            return true;
        }
        self.cipher.supports(self.key_length)
    }
}

/// Input to [`CopyProperties::apply_reencryption`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReencryptionSetting {
    /// Keep whatever the source copy used.
    Preserve,
    Reencrypt { cipher: Cipher, key_length: u32 },
}

impl CopyProperties {
    /// Applies an encryption mode.
    ///
    /// Plain text without network encryption clears the encryption block.
    /// Re-encryption and network encryption fill it with the cipher and key
    /// length; re-encryption also marks the dependent primary. `preserve`
    /// suppresses re-encryption.
    pub fn apply_encryption(&mut self, settings: &EncryptionSettings) {
        let re_encrypt = settings.re_encryption && !settings.preserve;

        self.copy_flags.preserve_encryption_mode_as_in_source = Some(bit(settings.preserve));
        self.copy_flags.aux_copy_reencrypt_data = Some(bit(re_encrypt));
        self.copy_flags.store_plain_text = Some(bit(settings.plain_text));
        self.copy_flags.encrypt_on_network_using_selected_cipher =
            Some(bit(settings.network_encryption));
        self.extended_flags.encrypt_on_dependent_primary = Some(0);

        if settings.plain_text && !settings.network_encryption {
            self.data_encryption = Some(DataEncryption::default());
        } else if self.data_encryption.is_none() {
            self.data_encryption = Some(DataEncryption {
                encrypt_data: Some(0),
                ..DataEncryption::default()
            });
        }

        if re_encrypt || settings.network_encryption {
            let block = self.data_encryption.get_or_insert_with(DataEncryption::default);
            block.encrypt_data = Some(1);
            block.encryption_type = Some(settings.cipher.wire_name().to_string());
            block.encryption_key_length = Some(settings.key_length);
            if re_encrypt {
                self.extended_flags.encrypt_on_dependent_primary = Some(1);
            }
        }
    }

    pub fn apply_reencryption(&mut self, setting: &ReencryptionSetting) {
        match *setting {
            ReencryptionSetting::Preserve => {
                self.extended_flags.encrypt_on_dependent_primary = Some(0);
                self.data_encryption = Some(DataEncryption {
                    encrypt_data: Some(0),
                    ..DataEncryption::default()
                });
                self.copy_flags.aux_copy_reencrypt_data = Some(0);
                self.copy_flags.preserve_encryption_mode_as_in_source = Some(1);
            }
            ReencryptionSetting::Reencrypt { cipher, key_length } => {
                self.extended_flags.encrypt_on_dependent_primary = Some(1);
                self.copy_flags.aux_copy_reencrypt_data = Some(1);
                self.copy_flags.preserve_encryption_mode_as_in_source = Some(0);
                let block = self.data_encryption.get_or_insert_with(DataEncryption::default);
                block.encrypt_data = Some(1);
                block.encryption_type = Some(cipher.wire_name().to_string());
                block.encryption_key_length = Some(key_length);
            }
        }
    }

    /// Binds a registered key management server and requests a master key
    /// rotation. Replaces the encryption block.
    pub fn set_key_management_server(&mut self, kms_name: &str) -> Result<(), ValidationError> {
        require_non_empty("key management server", kms_name)?;
        self.data_encryption = Some(DataEncryption {
            key_provider_name: Some(kms_name.trim().to_string()),
            rotate_master_key: true,
            ..DataEncryption::default()
        });
        Ok(())
    }

    /// Requests a master key rotation; the service rotates on commit.
    pub fn rotate_master_key(&mut self) {
        self.data_encryption = Some(DataEncryption {
            rotate_master_key: true,
            ..DataEncryption::default()
        });
    }

    pub fn encryption_mode(&self) -> EncryptionMode {
        let flags = &self.copy_flags;
        if is_set(flags.aux_copy_reencrypt_data) {
            EncryptionMode::ReEncrypt
        } else if is_set(flags.encrypt_on_network_using_selected_cipher) {
            EncryptionMode::NetworkEncrypt
        } else if is_set(flags.preserve_encryption_mode_as_in_source) {
            EncryptionMode::PreserveSource
        } else if is_set(flags.store_plain_text) {
            EncryptionMode::PlainText
        } else {
            EncryptionMode::Unspecified
        }
    }

    pub fn key_provider_name(&self) -> Option<&str> {
        self.data_encryption
            .as_ref()
            .and_then(|d| d.key_provider_name.as_deref())
    }

    /// Re-encryption state of an auxiliary copy. `None` when the copy
    /// neither preserves nor re-encrypts, or names a cipher outside the table.
    pub fn copy_reencryption(&self) -> Option<ReencryptionSetting> {
        if is_set(self.copy_flags.aux_copy_reencrypt_data) {
            let block = self.data_encryption.as_ref()?;
            let cipher = block.encryption_type.as_deref()?.parse::<Cipher>().ok()?;
            return Some(ReencryptionSetting::Reencrypt {
                cipher,
                key_length: block.encryption_key_length?,
            });
        }
        if is_set(self.copy_flags.preserve_encryption_mode_as_in_source) {
            return Some(ReencryptionSetting::Preserve);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props() -> CopyProperties {
        CopyProperties::from_value(json!({
            "StoragePolicyCopy": {"copyId": 8, "copyName": "offsite"},
            "copyFlags": {"auxCopyReencryptData": 0},
            "extendedFlags": {"encryptOnDependentPrimary": 0},
            "dataEncryption": {"encryptData": 1, "encryptionType": "AES", "encryptionKeyLength": 256}
        }))
        .unwrap()
    }

    #[test]
    fn test_plain_text_clears_block() {
        let mut p = props();
        p.apply_encryption(&EncryptionSettings::plain_text());
        assert_eq!(p.data_encryption, Some(DataEncryption::default()));
        assert_eq!(p.encryption_mode(), EncryptionMode::PlainText);
        assert_eq!(p.to_value().unwrap()["dataEncryption"], json!({}));
    }

    #[test]
    fn test_copy_reencryption_state() {
        let mut p = props();
        assert_eq!(p.copy_reencryption(), None);

        p.apply_reencryption(&ReencryptionSetting::Reencrypt {
            cipher: Cipher::TwoFish,
            key_length: 256,
        });
        assert_eq!(
            p.copy_reencryption(),
            Some(ReencryptionSetting::Reencrypt {
                cipher: Cipher::TwoFish,
                key_length: 256
            })
        );

        p.apply_reencryption(&ReencryptionSetting::Preserve);
        assert_eq!(p.copy_reencryption(), Some(ReencryptionSetting::Preserve));
    }

    #[test]
    fn test_plain_text_with_network_keeps_cipher() {
        let mut p = props();
        let settings = EncryptionSettings {
            plain_text: true,
            ..EncryptionSettings::network(Cipher::Serpent, 128)
        };
        p.apply_encryption(&settings);
        let block = p.data_encryption.clone().unwrap();
        assert_eq!(block.encrypt_data, Some(1));
        assert_eq!(block.encryption_type.as_deref(), Some("Serpent"));
        assert_eq!(p.extended_flags.encrypt_on_dependent_primary, Some(0));
        assert_eq!(p.encryption_mode(), EncryptionMode::NetworkEncrypt);
    }

    #[test]
    fn test_re_encryption_marks_dependent_primary() {
        let mut p = CopyProperties::default();
        p.apply_encryption(&EncryptionSettings::re_encrypt(Cipher::TwoFish, 256));
        let block = p.data_encryption.clone().unwrap();
        assert_eq!(block.encrypt_data, Some(1));
        assert_eq!(block.encryption_type.as_deref(), Some("TwoFish"));
        assert_eq!(block.encryption_key_length, Some(256));
        assert_eq!(p.extended_flags.encrypt_on_dependent_primary, Some(1));
        assert_eq!(p.copy_flags.aux_copy_reencrypt_data, Some(1));
        assert_eq!(p.encryption_mode(), EncryptionMode::ReEncrypt);
    }

    #[test]
    fn test_preserve_suppresses_re_encryption() {
        let mut p = CopyProperties::default();
        let settings = EncryptionSettings {
            preserve: true,
            ..EncryptionSettings::re_encrypt(Cipher::Aes, 128)
        };
        p.apply_encryption(&settings);
        assert_eq!(p.copy_flags.aux_copy_reencrypt_data, Some(0));
        assert_eq!(p.extended_flags.encrypt_on_dependent_primary, Some(0));
        assert_eq!(p.data_encryption.clone().unwrap().encrypt_data, Some(0));
        assert_eq!(p.encryption_mode(), EncryptionMode::PreserveSource);
    }

    #[test]
    fn test_reencryption_setter() {
        let mut p = props();
        p.apply_reencryption(&ReencryptionSetting::Preserve);
        assert_eq!(p.copy_flags.preserve_encryption_mode_as_in_source, Some(1));
        assert_eq!(p.to_value().unwrap()["dataEncryption"], json!({"encryptData": 0}));

        p.apply_reencryption(&ReencryptionSetting::Reencrypt {
            cipher: Cipher::Des3,
            key_length: 192,
        });
        assert_eq!(p.encryption_mode(), EncryptionMode::ReEncrypt);
        assert_eq!(
            p.to_value().unwrap()["dataEncryption"],
            json!({"encryptData": 1, "encryptionType": "DES3", "encryptionKeyLength": 192})
        );
    }

    #[test]
    fn test_key_management_server() {
        let mut p = props();
        p.set_key_management_server("vault-kms").unwrap();
        assert_eq!(
            p.to_value().unwrap()["dataEncryption"],
            json!({"keyProviderName": "vault-kms", "rotateMasterKey": true})
        );
        assert_eq!(p.key_provider_name(), Some("vault-kms"));
        assert!(p.set_key_management_server(" ").is_err());

        p.rotate_master_key();
        assert_eq!(p.to_value().unwrap()["dataEncryption"], json!({"rotateMasterKey": true}));
    }

    #[test]
    fn test_cipher_table() {
        assert!(Cipher::Blowfish.supports(128));
        assert!(Cipher::Aes.supports(256));
        assert!(Cipher::Gost.supports(256));
        assert!(!Cipher::Gost.supports(128));
        assert!(Cipher::Des3.supports(192));
        assert!(!Cipher::Des3.supports(256));
        assert!(!EncryptionSettings::re_encrypt(Cipher::Des3, 128).is_supported());
        assert!(EncryptionSettings::plain_text().is_supported());
        assert_eq!("aes".parse::<Cipher>().unwrap(), Cipher::Aes);
        assert_eq!("BlowFish".parse::<Cipher>().unwrap(), Cipher::Blowfish);
    }
}
