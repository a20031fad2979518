use serde::{Deserialize, Serialize};

use crate::codec::{decode_hash32, reverse_bytes, varint_size, write_varbytes, write_varint};
use crate::error::Result;
use crate::hashes::hash256;

/// Standard script templates carried in the mempool JSON. Anything the
/// validator does not recognize deserializes as `Unknown` and the
/// transaction is skipped rather than failing the whole decode.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptType {
    #[serde(rename = "p2pkh")]
    P2pkh,
    #[serde(rename = "p2sh")]
    P2sh,
    #[serde(rename = "v0_p2wpkh")]
    P2wpkh,
    #[serde(rename = "v0_p2wsh")]
    P2wsh,
    #[serde(rename = "v1_p2tr")]
    P2tr,
    #[serde(rename = "unknown", other)]
    Unknown,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Transaction {
    pub version: i32,
    pub locktime: u32,
    pub vin: Vec<Input>,
    pub vout: Vec<Output>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Input {
    /// Referenced txid in display (reversed) order, as it appears in JSON.
    pub txid: String,
    pub vout: u32,
    pub prevout: Prevout,
    pub scriptsig: Option<String>,
    pub scriptsig_asm: Option<String>,
    pub witness: Option<Vec<String>>,
    #[serde(default)]
    pub is_coinbase: bool,
    pub sequence: u32,
}

/// Snapshot of the output being spent. `value` is signed so the
/// SIGHASH_SINGLE placeholder of -1 stays representable.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Prevout {
    pub scriptpubkey: String,
    pub scriptpubkey_asm: String,
    pub scriptpubkey_type: ScriptType,
    #[serde(default)]
    pub scriptpubkey_address: Option<String>,
    pub value: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Output {
    pub scriptpubkey: String,
    #[serde(default)]
    pub scriptpubkey_asm: String,
    #[serde(default)]
    pub scriptpubkey_type: String,
    #[serde(default)]
    pub scriptpubkey_address: Option<String>,
    pub value: i64,
}

impl Input {
    pub fn script_sig_bytes(&self) -> Result<Vec<u8>> {
        match &self.scriptsig {
            Some(hex_str) => Ok(hex::decode(hex_str)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn prev_script_pubkey(&self) -> Result<Vec<u8>> {
        Ok(hex::decode(&self.prevout.scriptpubkey)?)
    }

    /// Referenced txid converted once into natural byte order.
    pub fn prev_txid_natural(&self) -> Result<[u8; 32]> {
        decode_hash32(&self.txid)
    }

    pub fn witness_items(&self) -> Result<Vec<Vec<u8>>> {
        let mut items = Vec::new();
        if let Some(witness) = &self.witness {
            for item in witness {
                items.push(hex::decode(item)?);
            }
        }
        Ok(items)
    }
}

/// `value (LE64) || varbytes(script_pubkey)` — the wire form of one output,
/// shared by the serializer and every sighash algorithm.
pub fn write_txout(buf: &mut Vec<u8>, value: i64, script_pubkey_hex: &str) -> Result<()> {
    buf.extend((value as u64).to_le_bytes());
    let script = hex::decode(script_pubkey_hex)?;
    write_varbytes(buf, &script);
    Ok(())
}

fn write_txin(buf: &mut Vec<u8>, input: &Input) -> Result<()> {
    buf.extend(input.prev_txid_natural()?);
    buf.extend(input.vout.to_le_bytes());
    write_varbytes(buf, &input.script_sig_bytes()?);
    buf.extend(input.sequence.to_le_bytes());
    Ok(())
}

impl Transaction {
    /// True iff at least one input carries a non-empty witness list.
    pub fn has_witness(&self) -> bool {
        self.vin
            .iter()
            .any(|input| input.witness.as_ref().map_or(false, |w| !w.is_empty()))
    }

    /// Input sum minus output sum. Negative means the transaction tries to
    /// create coins and must be rejected.
    pub fn fee(&self) -> i64 {
        let input_sum: i64 = self.vin.iter().map(|i| i.prevout.value).sum();
        let output_sum: i64 = self.vout.iter().map(|o| o.value).sum();
        input_sum - output_sum
    }

    /// Serializes to the legacy wire form, or to the BIP-144 witness form
    /// when `include_witness` is set. Txid hashing wants the legacy form and
    /// wtxid hashing the witness form, so the switch stays explicit instead
    /// of being inferred from the witness lists.
    pub fn serialize(&self, include_witness: bool) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend((self.version as u32).to_le_bytes());
        if include_witness {
            // marker and flag
            buf.push(0x00);
            buf.push(0x01);
        }
        write_varint(&mut buf, self.vin.len() as u64);
        for input in &self.vin {
            write_txin(&mut buf, input)?;
        }
        write_varint(&mut buf, self.vout.len() as u64);
        for output in &self.vout {
            write_txout(&mut buf, output.value, &output.scriptpubkey)?;
        }
        if include_witness {
            for input in &self.vin {
                let items = input.witness_items()?;
                write_varint(&mut buf, items.len() as u64);
                for item in &items {
                    write_varbytes(&mut buf, item);
                }
            }
        }
        buf.extend(self.locktime.to_le_bytes());
        Ok(buf)
    }

    /// Byte length of the legacy serialization, computed without
    /// serializing.
    pub fn base_size(&self) -> Result<usize> {
        // version 4 + locktime 4 + the two count varints
        let mut n =
            8 + varint_size(self.vin.len() as u64) + varint_size(self.vout.len() as u64);
        for input in &self.vin {
            let script_sig = input.script_sig_bytes()?;
            n += 40 + varint_size(script_sig.len() as u64) + script_sig.len();
        }
        for output in &self.vout {
            let script = hex::decode(&output.scriptpubkey)?;
            n += 8 + varint_size(script.len() as u64) + script.len();
        }
        Ok(n)
    }

    /// Byte length of the witness serialization (legacy length for a
    /// transaction with no witness data).
    pub fn total_size(&self) -> Result<usize> {
        if !self.has_witness() {
            return self.base_size();
        }
        // marker and flag on top of the legacy form
        let mut n = self.base_size()? + 2;
        for input in &self.vin {
            let items = input.witness_items()?;
            n += varint_size(items.len() as u64);
            for item in &items {
                n += varint_size(item.len() as u64) + item.len();
            }
        }
        Ok(n)
    }

    pub fn weight(&self) -> Result<usize> {
        Ok(3 * self.base_size()? + self.total_size()?)
    }

    /// Double-SHA256 of the legacy serialization, natural byte order.
    pub fn txid(&self) -> Result<[u8; 32]> {
        Ok(hash256(&self.serialize(false)?))
    }

    /// Double-SHA256 of the witness serialization, natural byte order.
    pub fn wtxid(&self) -> Result<[u8; 32]> {
        Ok(hash256(&self.serialize(self.has_witness())?))
    }

    /// Txid in the display order used by filenames and the output file.
    pub fn txid_hex(&self) -> Result<String> {
        Ok(hex::encode(reverse_bytes(&self.txid()?)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn dummy_prevout(script_pubkey: &str, script_type: ScriptType, value: i64) -> Prevout {
        Prevout {
            scriptpubkey: script_pubkey.to_string(),
            scriptpubkey_asm: String::new(),
            scriptpubkey_type: script_type,
            scriptpubkey_address: None,
            value,
        }
    }

    fn legacy_tx() -> Transaction {
        Transaction {
            version: 2,
            locktime: 0,
            vin: vec![Input {
                txid: "f7268fdc3dd4ab2ce606a9857f321f9c9d94a7cc4ca7d31db481938ce222403e"
                    .to_string(),
                vout: 28,
                prevout: dummy_prevout(
                    "76a9145ae0dedcb9a96b8d4310e4ff137a22e0233258e988ac",
                    ScriptType::P2pkh,
                    150653,
                ),
                scriptsig: Some("51".to_string()),
                scriptsig_asm: None,
                witness: None,
                is_coinbase: false,
                sequence: 4294967293,
            }],
            vout: vec![Output {
                scriptpubkey: "0014bc2870381de4d706a92105419f0c3072e26532d1".to_string(),
                scriptpubkey_asm: String::new(),
                scriptpubkey_type: "v0_p2wpkh".to_string(),
                scriptpubkey_address: None,
                value: 147107,
            }],
        }
    }

    fn segwit_tx() -> Transaction {
        let mut tx = legacy_tx();
        tx.vin[0].scriptsig = Some(String::new());
        tx.vin[0].witness = Some(vec!["aa".repeat(71), "bb".repeat(33)]);
        tx
    }

    #[test]
    fn legacy_layout() {
        let tx = legacy_tx();
        let raw = tx.serialize(false).unwrap();

        // version || varint(1) || txid || vout || varbytes(scriptsig) ||
        // sequence || varint(1) || value || varbytes(spk) || locktime
        assert_eq!(&raw[0..4], &2u32.to_le_bytes());
        assert_eq!(raw[4], 1);
        assert_eq!(raw[5], 0x3e); // txid reversed into natural order
        assert_eq!(&raw[37..41], &28u32.to_le_bytes());
        assert_eq!(raw[41], 1);
        assert_eq!(raw[42], 0x51);
        assert_eq!(&raw[43..47], &4294967293u32.to_le_bytes());
        assert_eq!(raw.len(), 4 + 1 + 32 + 4 + 2 + 4 + 1 + 8 + 1 + 22 + 4);
        assert_eq!(&raw[raw.len() - 4..], &0u32.to_le_bytes());
    }

    #[test]
    fn witness_form_has_marker_and_flag() {
        let tx = segwit_tx();
        let raw = tx.serialize(true).unwrap();
        assert_eq!(raw[4], 0x00);
        assert_eq!(raw[5], 0x01);

        // the legacy form of the same transaction must not carry them
        let base = tx.serialize(false).unwrap();
        assert_eq!(base[4], 1);
    }

    #[test]
    fn weight_law() {
        for tx in [legacy_tx(), segwit_tx()] {
            let base = tx.base_size().unwrap();
            let total = tx.total_size().unwrap();
            assert_eq!(tx.weight().unwrap(), 3 * base + total);
        }
        // without witness data both sizes agree and weight is 4x
        let tx = legacy_tx();
        assert_eq!(tx.weight().unwrap(), 4 * tx.base_size().unwrap());
    }

    #[test]
    fn computed_sizes_match_serialization() {
        for tx in [legacy_tx(), segwit_tx()] {
            assert_eq!(tx.base_size().unwrap(), tx.serialize(false).unwrap().len());
        }
        let tx = segwit_tx();
        assert_eq!(tx.total_size().unwrap(), tx.serialize(true).unwrap().len());
    }

    #[test]
    fn txid_ignores_witness_data() {
        let mut tx = segwit_tx();
        let txid = tx.txid().unwrap();
        let wtxid = tx.wtxid().unwrap();
        assert_ne!(txid, wtxid);

        tx.vin[0].witness = Some(vec!["cc".repeat(71), "dd".repeat(33)]);
        assert_eq!(tx.txid().unwrap(), txid);
        assert_ne!(tx.wtxid().unwrap(), wtxid);
    }

    #[test]
    fn txid_hex_is_display_order() {
        let tx = legacy_tx();
        let natural = tx.txid().unwrap();
        let display = tx.txid_hex().unwrap();
        assert_eq!(display, hex::encode(reverse_bytes(&natural)));
        assert_eq!(display.len(), 64);
    }

    #[test]
    fn fee_arithmetic() {
        let mut tx = legacy_tx();
        assert_eq!(tx.fee(), 150653 - 147107);
        tx.vout[0].value = 150654;
        assert!(tx.fee() < 0);
    }

    #[test]
    fn negative_value_serializes_as_all_ones() {
        let mut buf = Vec::new();
        write_txout(&mut buf, -1, "").unwrap();
        assert_eq!(&buf[0..8], &[0xff; 8]);
        assert_eq!(buf[8], 0x00);
    }

    #[test]
    fn script_type_decoding() {
        let parsed: ScriptType = serde_json::from_str(r#""v1_p2tr""#).unwrap();
        assert_eq!(parsed, ScriptType::P2tr);

        let parsed: ScriptType = serde_json::from_str(r#""p2pk""#).unwrap();
        assert_eq!(parsed, ScriptType::Unknown);
    }
}
