//! Document id bit packing.
//!
//! A document id packs three fields into one `u64`, most significant
//! first: `[rank:7][domain_id:31][ordinal:26]`. Sorting ids therefore
//! sorts by rank, then domain, then intra-domain ordinal, which is the
//! property the priority index's delta coding relies on.

/// Number of bits in the rank field.
pub const RANK_BITS: u32 = 7;
/// Number of bits in the domain id field.
pub const DOMAIN_ID_BITS: u32 = 31;
/// Number of bits in the document ordinal field.
pub const ORDINAL_BITS: u32 = 26;

/// Largest encodable rank.
pub const MAX_RANK: u8 = (1 << RANK_BITS) - 1;
/// Largest encodable domain id.
pub const MAX_DOMAIN_ID: u32 = (1 << DOMAIN_ID_BITS) - 1;
/// Largest encodable document ordinal.
pub const MAX_ORDINAL: u32 = (1 << ORDINAL_BITS) - 1;

/// Pack a (rank, domain id, ordinal) triple into a document id.
///
/// Inputs must fit their field widths; callers validate before encoding.
#[inline]
pub fn encode_document_id(rank: u8, domain_id: u32, ordinal: u32) -> u64 {
    debug_assert!(rank <= MAX_RANK, "rank {rank} exceeds {RANK_BITS} bits");
    debug_assert!(
        domain_id <= MAX_DOMAIN_ID,
        "domain id {domain_id} exceeds {DOMAIN_ID_BITS} bits"
    );
    debug_assert!(
        ordinal <= MAX_ORDINAL,
        "ordinal {ordinal} exceeds {ORDINAL_BITS} bits"
    );

    (rank as u64) << (DOMAIN_ID_BITS + ORDINAL_BITS)
        | (domain_id as u64) << ORDINAL_BITS
        | ordinal as u64
}

/// Unpack a document id into its (rank, domain id, ordinal) triple.
#[inline]
pub fn decode_document_id(id: u64) -> (u8, u32, u32) {
    (rank(id), domain_id(id), document_ordinal(id))
}

/// The rank field of a document id.
#[inline]
pub fn rank(id: u64) -> u8 {
    (id >> (DOMAIN_ID_BITS + ORDINAL_BITS)) as u8
}

/// The domain id field of a document id.
#[inline]
pub fn domain_id(id: u64) -> u32 {
    ((id >> ORDINAL_BITS) & MAX_DOMAIN_ID as u64) as u32
}

/// The document ordinal field of a document id.
#[inline]
pub fn document_ordinal(id: u64) -> u32 {
    (id & MAX_ORDINAL as u64) as u32
}
