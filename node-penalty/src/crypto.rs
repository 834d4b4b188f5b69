//! Signing, verification and hashing over canonical payload bytes.
//!
//! Thin wrappers over the Solana primitives so the rest of the crate only
//! deals in [`TxSignature`] and [`Hash`].

use {
    crate::types::TxSignature,
    solana_hash::Hash,
    solana_signer::Signer,
};

/// SHA-256 of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> Hash {
    solana_sha256_hasher::hashv(&[bytes])
}

/// Sign `payload` with `signer`, recording the signer's key as the owner.
pub fn sign_payload(signer: &dyn Signer, payload: &[u8]) -> TxSignature {
    TxSignature {
        owner: signer.pubkey(),
        sig: signer.sign_message(payload),
    }
}

/// Check `signature` against its claimed owner.
pub fn verify_signature(payload: &[u8], signature: &TxSignature) -> bool {
    signature.sig.verify(signature.owner.as_ref(), payload)
}

/// Hex encoding of a public key, the form node ids take on the wire.
pub fn node_id_from_pubkey(pubkey: &solana_pubkey::Pubkey) -> String {
    hex::encode(pubkey.as_ref())
}

#[cfg(test)]
mod tests {
    use {super::*, solana_keypair::Keypair};

    #[test]
    fn test_sign_and_verify() {
        let keypair = Keypair::new();
        let sig = sign_payload(&keypair, b"penalty");
        assert_eq!(sig.owner, keypair.pubkey());
        assert!(verify_signature(b"penalty", &sig));
        assert!(!verify_signature(b"tampered", &sig));
    }

    #[test]
    fn test_verify_rejects_wrong_owner() {
        let keypair = Keypair::new();
        let mut sig = sign_payload(&keypair, b"penalty");
        sig.owner = Keypair::new().pubkey();
        assert!(!verify_signature(b"penalty", &sig));
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_bytes(b"abc"), hash_bytes(b"abc"));
        assert_ne!(hash_bytes(b"abc"), hash_bytes(b"abd"));
    }

    #[test]
    fn test_hash_matches_sha256() {
        assert_eq!(
            hex::encode(hash_bytes(b"abc").as_ref()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_node_id_is_64_hex_chars() {
        let id = node_id_from_pubkey(&Keypair::new().pubkey());
        assert_eq!(id.len(), crate::types::NODE_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
