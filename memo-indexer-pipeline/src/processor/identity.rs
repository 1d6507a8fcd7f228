use bitcoin::Script;
use bitcoin::script::Instruction;
use memo_indexer_shared::types::{Identity, LedgerTransaction};

const COMPRESSED_PUBKEY_SIZE: usize = 33;
const UNCOMPRESSED_PUBKEY_SIZE: usize = 65;

/// Maps a transaction to the identity that signed it.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, transaction: &LedgerTransaction) -> Option<Identity>;
}

/// Takes the public key revealed by the first input, either as the last push
/// of a P2PKH `scriptSig` or as the last witness element of a P2WPKH spend,
/// and hashes it.
pub struct P2pkhIdentityResolver;

fn is_pubkey(bytes: &[u8]) -> bool {
    matches!(bytes.len(), COMPRESSED_PUBKEY_SIZE | UNCOMPRESSED_PUBKEY_SIZE)
}

impl IdentityResolver for P2pkhIdentityResolver {
    fn resolve(&self, transaction: &LedgerTransaction) -> Option<Identity> {
        let input = transaction.inputs.first()?;

        let from_script_sig = Script::from_bytes(&input.script_sig)
            .instructions()
            .filter_map(|instruction| match instruction {
                Ok(Instruction::PushBytes(data)) => Some(data.as_bytes()),
                _ => None,
            })
            .last()
            .filter(|pubkey| is_pubkey(pubkey));

        from_script_sig
            .or_else(|| {
                input
                    .witness
                    .last()
                    .map(Vec::as_slice)
                    .filter(|pubkey| is_pubkey(pubkey))
            })
            .map(Identity::from_pubkey)
    }
}
