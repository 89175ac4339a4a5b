//! `ChannelDownstream` against scripted peers on loopback.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use market_wire::{ChannelConfig, Handler, Socket};
use marketplace::bank::BankHandler;
use marketplace::client::CARD_NUMBER;
use marketplace::store::{ChannelDownstream, Downstream, Verdict};
use marketplace::CatalogItem;
use rust_decimal::Decimal;

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn item(id: i64, price: &str) -> CatalogItem {
    CatalogItem {
        id,
        price: Decimal::from_str(price).unwrap(),
    }
}

/// The bank answers the first validation twice (a slow reply plus the reply
/// to its retransmission).  The second purchase must still get its own verdict.
#[tokio::test]
async fn late_bank_duplicate_does_not_decide_next_purchase() {
    let bank = Socket::bind(SocketAddr::new(LOOPBACK, 0)).await.unwrap();
    let bank_addr = bank.local_addr;

    let peer = tokio::spawn(async move {
        let mut handler = BankHandler::new();
        let (first, from) = bank.recv_from().await.unwrap();
        let verdict = handler.handle(first, from).await.unwrap();
        bank.send_to(&verdict, from).await.unwrap();
        bank.send_to(&verdict, from).await.unwrap();

        let (second, from) = bank.recv_from().await.unwrap();
        let verdict = handler.handle(second, from).await.unwrap();
        bank.send_to(&verdict, from).await.unwrap();
        handler.decisions()
    });

    // Content is never contacted here; any address will do.
    let mut downstream = ChannelDownstream::connect(LOOPBACK, bank_addr, bank_addr, &ChannelConfig::default())
        .await
        .unwrap();

    let odd = tokio::time::timeout(Duration::from_secs(5), downstream.validate(&item(1, "5.0"), CARD_NUMBER))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(odd, Verdict::Approved);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let even = tokio::time::timeout(Duration::from_secs(5), downstream.validate(&item(2, "7.5"), CARD_NUMBER))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(even, Verdict::Declined);
    assert_eq!(peer.await.unwrap(), (1, 1));
}
