use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Competitor ads, one snapshot per captured_at
        manager
            .create_table(
                Table::create()
                    .table(P2pAds::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(P2pAds::Id).big_integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(P2pAds::Exchange).string().not_null())
                    .col(ColumnDef::new(P2pAds::AdvNo).string().not_null())
                    .col(ColumnDef::new(P2pAds::TradeType).string().not_null()) // advertiser side: "buy" or "sell"
                    .col(ColumnDef::new(P2pAds::Asset).string().not_null())
                    .col(ColumnDef::new(P2pAds::Fiat).string().not_null())
                    .col(crate::decimal_column(manager, P2pAds::Price, 20, 8).not_null())
                    .col(crate::decimal_column(manager, P2pAds::SurplusAmount, 20, 8).not_null().default(0))
                    .col(crate::decimal_column(manager, P2pAds::MinAmount, 20, 8).not_null().default(0))
                    .col(crate::decimal_column(manager, P2pAds::MaxAmount, 20, 8).not_null().default(0))
                    .col(ColumnDef::new(P2pAds::AdvertiserNickname).string().not_null())
                    .col(ColumnDef::new(P2pAds::AdvertiserMerchantNo).string().null())
                    .col(ColumnDef::new(P2pAds::MonthOrderCount).integer().not_null().default(0))
                    .col(crate::decimal_column(manager, P2pAds::MonthFinishRate, 10, 4).not_null().default(0))
                    .col(ColumnDef::new(P2pAds::PaymentMethods).json().null())
                    .col(ColumnDef::new(P2pAds::Rank).integer().not_null())
                    .col(ColumnDef::new(P2pAds::CapturedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_p2p_ads_pair_captured")
                    .table(P2pAds::Table)
                    .col(P2pAds::Exchange)
                    .col(P2pAds::Asset)
                    .col(P2pAds::Fiat)
                    .col(P2pAds::TradeType)
                    .col(P2pAds::CapturedAt)
                    .to_owned(),
            )
            .await?;

        // Reference prices derived from each snapshot
        manager
            .create_table(
                Table::create()
                    .table(MarketData::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(MarketData::Id).big_integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(MarketData::Exchange).string().not_null())
                    .col(ColumnDef::new(MarketData::Asset).string().not_null())
                    .col(ColumnDef::new(MarketData::Fiat).string().not_null())
                    .col(crate::decimal_column(manager, MarketData::BestBuyPrice, 20, 8).null())
                    .col(crate::decimal_column(manager, MarketData::BestSellPrice, 20, 8).null())
                    .col(crate::decimal_column(manager, MarketData::AverageBuyPrice, 20, 8).null())
                    .col(crate::decimal_column(manager, MarketData::AverageSellPrice, 20, 8).null())
                    .col(crate::decimal_column(manager, MarketData::Spread, 20, 8).null())
                    .col(ColumnDef::new(MarketData::AdsCount).integer().not_null().default(0))
                    .col(ColumnDef::new(MarketData::CapturedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_market_data_pair_captured")
                    .table(MarketData::Table)
                    .col(MarketData::Asset)
                    .col(MarketData::Fiat)
                    .col(MarketData::CapturedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MarketData::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(P2pAds::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum P2pAds {
    Table,
    Id,
    Exchange,
    AdvNo,
    TradeType,
    Asset,
    Fiat,
    Price,
    SurplusAmount,
    MinAmount,
    MaxAmount,
    AdvertiserNickname,
    AdvertiserMerchantNo,
    MonthOrderCount,
    MonthFinishRate,
    PaymentMethods,
    Rank,
    CapturedAt,
}

#[derive(DeriveIden)]
enum MarketData {
    Table,
    Id,
    Exchange,
    Asset,
    Fiat,
    BestBuyPrice,
    BestSellPrice,
    AverageBuyPrice,
    AverageSellPrice,
    Spread,
    AdsCount,
    CapturedAt,
}
