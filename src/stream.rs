use std::time::Duration;

use alloy::{
    primitives::Address,
    providers::Provider,
    rpc::types::{Filter, Log},
    sol_types::SolEventInterface,
};
use futures::{Stream, stream};

use crate::{
    abi::exchange::Exchange::ExchangeEvents,
    error::ExchangeError,
    types::{EventContext, EventKind, ExchangeEvent},
};

pub type RawEvent = EventContext<ExchangeEvents>;

/// Events emitted by the exchange within a single block.
#[derive(Debug)]
pub struct BlockEvents {
    block_number: u64,
    events: Vec<EventContext<ExchangeEvent>>,
}

impl BlockEvents {
    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn into_events(self) -> Vec<EventContext<ExchangeEvent>> {
        self.events
    }
}

/// Decodes exchange log along with its transaction context.
pub fn decode(log: &Log) -> Result<RawEvent, ExchangeError> {
    Ok(RawEvent::new(
        log.transaction_hash.unwrap_or_default(),
        log.block_number.unwrap_or_default(),
        log.log_index.unwrap_or_default(),
        ExchangeEvents::decode_log(&log.inner)?.data,
    ))
}

/// Reads historical events of the given kind emitted by the exchange
/// within the inclusive block range, in emission order.
pub async fn history<P: Provider>(
    provider: &P,
    exchange: Address,
    from_block: u64,
    to_block: u64,
    kind: EventKind,
) -> Result<Vec<EventContext<ExchangeEvent>>, ExchangeError> {
    let filter = Filter::new()
        .address(exchange)
        .event_signature(kind.signature_hash())
        .from_block(from_block)
        .to_block(to_block);
    provider
        .get_logs(&filter)
        .await?
        .iter()
        .map(|log| decode(log).map(|raw| raw.map(ExchangeEvent::from)))
        .collect()
}

/// Returns stream of decoded events emitted by the exchange contract,
/// batched per block, starting from the specified block.
///
/// Polls logs via the given [`Provider`] to produce strictly continuous
/// event sequence, with [`Provider`]-configured interval.
///
/// It is recommended to setup provider with
/// [`alloy::transports::layers::RetryBackoffLayer`].
pub fn raw<P, S, SFut>(
    exchange: Address,
    provider: P,
    from_block: u64,
    sleep: S,
) -> impl Stream<Item = Result<BlockEvents, ExchangeError>>
where
    P: Provider,
    S: Fn(Duration) -> SFut + Copy,
    SFut: Future<Output = ()>,
{
    stream::unfold(
        (provider, from_block),
        move |(provider, mut block_num)| async move {
            let filter = Filter::new()
                .address(exchange)
                .from_block(block_num)
                .to_block(block_num);
            loop {
                // Some nodes produce empty response instead of error in case
                // the block in the filter does not exist yet, so checking
                // against the tip of the chain as well
                let result =
                    futures::try_join!(provider.get_block_number(), provider.get_logs(&filter))
                        .map_err(ExchangeError::from)
                        .and_then(|(head_block_num, logs)| {
                            if head_block_num < block_num {
                                return Err(ExchangeError::InvalidRequest(
                                    "block is not available yet".to_string(),
                                ));
                            }
                            let events = logs
                                .iter()
                                .map(|log| decode(log).map(|raw| raw.map(ExchangeEvent::from)))
                                .collect::<Result<Vec<_>, _>>()?;
                            Ok(BlockEvents {
                                block_number: block_num,
                                events,
                            })
                        });
                match result {
                    Ok(block) => {
                        block_num += 1;
                        return Some((Ok(block), (provider, block_num)));
                    }
                    Err(ExchangeError::InvalidRequest(_)) => {
                        // Block is not available yet
                        sleep(provider.client().poll_interval()).await;
                    }
                    Err(err) => {
                        sleep(provider.client().poll_interval()).await;
                        return Some((Err(err), (provider, block_num)));
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use alloy::{
        primitives::{Address, LogData, U256, address, b256},
        rpc::types::Log,
        sol_types::SolEvent,
    };

    use super::*;
    use crate::abi::{ETHER_ADDRESS, exchange::Exchange};

    #[test]
    fn test_decode_order_log() {
        let user = address!("0x0000000000000000000000000000000000000a11");
        let token = address!("0x00000000000000000000000000000000000000aa");
        let event = Exchange::Order {
            id: U256::from(7),
            user,
            tokenGet: token,
            amountGet: U256::from(100),
            tokenGive: ETHER_ADDRESS,
            amountGive: U256::from(1),
            timestamp: U256::from(1_600_000_000u64),
        };
        let data: LogData = event.encode_log_data();
        let log = Log {
            inner: alloy::primitives::Log {
                address: Address::ZERO,
                data,
            },
            transaction_hash: Some(b256!(
                "0x47de82c4aa40baa30cabac4a74568488a8c74ded85a4e905f1ceaad4f29945e3"
            )),
            block_number: Some(12),
            log_index: Some(3),
            ..Default::default()
        };

        let raw = decode(&log).unwrap();
        assert_eq!(raw.block_number(), 12);
        assert_eq!(raw.log_index(), 3);
        let event = raw.map(ExchangeEvent::from).into_event();
        match event {
            ExchangeEvent::Order(order) => {
                assert_eq!(order.id(), U256::from(7));
                assert_eq!(order.trader(), user);
                assert_eq!(order.timestamp(), 1_600_000_000);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
