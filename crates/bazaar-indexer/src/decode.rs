use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;
use thiserror::Error;

sol! {
    event NFTMinted(address indexed creator, uint256 indexed tokenId);
    event NFTListed(address indexed seller, uint256 indexed tokenId, uint256 price);
    event NFTBought(address indexed buyer, uint256 indexed tokenId, uint256 price);
}

/// A decoded marketplace event. Produced solely by [`decode`], so the
/// projector's dispatch over it is exhaustive and statically checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketEvent {
    Minted { creator: Address, token_id: U256 },
    Listed { seller: Address, token_id: U256, price: U256 },
    Bought { buyer: Address, token_id: U256, price: U256 },
}

impl MarketEvent {
    pub fn token_id(&self) -> U256 {
        match self {
            MarketEvent::Minted { token_id, .. }
            | MarketEvent::Listed { token_id, .. }
            | MarketEvent::Bought { token_id, .. } => *token_id,
        }
    }
}

/// Both variants are skip-and-log conditions for callers, never fatal:
/// unknown signatures are expected once the contract grows new events.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unknown event signature: {topic0}")]
    UnknownSignature { topic0: String },

    #[error("malformed {event} payload: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: alloy::sol_types::Error,
    },
}

/// Topic0 hashes of every event the indexer tracks.
pub fn tracked_signatures() -> [B256; 3] {
    [
        NFTMinted::SIGNATURE_HASH,
        NFTListed::SIGNATURE_HASH,
        NFTBought::SIGNATURE_HASH,
    ]
}

/// Map one raw log to a typed marketplace event. Pure over the log's topics
/// and data fields.
pub fn decode(log: &Log) -> Result<MarketEvent, DecodeError> {
    let topic0 = log.topics().first().copied().ok_or(DecodeError::UnknownSignature {
        topic0: "<missing>".to_string(),
    })?;

    if topic0 == NFTMinted::SIGNATURE_HASH {
        let ev = NFTMinted::decode_log(&log.inner)
            .map_err(|source| DecodeError::Payload { event: "NFTMinted", source })?
            .data;
        Ok(MarketEvent::Minted { creator: ev.creator, token_id: ev.tokenId })
    } else if topic0 == NFTListed::SIGNATURE_HASH {
        let ev = NFTListed::decode_log(&log.inner)
            .map_err(|source| DecodeError::Payload { event: "NFTListed", source })?
            .data;
        Ok(MarketEvent::Listed { seller: ev.seller, token_id: ev.tokenId, price: ev.price })
    } else if topic0 == NFTBought::SIGNATURE_HASH {
        let ev = NFTBought::decode_log(&log.inner)
            .map_err(|source| DecodeError::Payload { event: "NFTBought", source })?
            .data;
        Ok(MarketEvent::Bought { buyer: ev.buyer, token_id: ev.tokenId, price: ev.price })
    } else {
        Err(DecodeError::UnknownSignature { topic0: format!("{topic0:?}") })
    }
}
