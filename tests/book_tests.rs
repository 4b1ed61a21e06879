use lotto_pool::{
    Book, Config, CutConfigInput, DrawDate, DrawNumbers, DrawResult, EntryInput,
    MissingCutConfig, Pattern, PoolError, PrizeRound, Source,
};
use rust_decimal::Decimal;
use tempfile::TempDir;

fn d(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn setup_test() -> (TempDir, Config) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = Config {
        database_url: dir
            .path()
            .join("nested/book.db")
            .to_string_lossy()
            .into_owned(),
        missing_cut_config: MissingCutConfig::Reject,
        ..Config::default()
    };
    (dir, config)
}

fn entry(buyer_id: i64, number: &str, top: &str, bottom2: &str) -> EntryInput {
    EntryInput {
        buyer_id,
        number: number.to_string(),
        top: Some(top.to_string()),
        bottom2: Some(bottom2.to_string()),
        ..Default::default()
    }
}

fn draw() -> DrawResult {
    DrawResult {
        date: DrawDate {
            date: "16".into(),
            month: "10".into(),
            year: "2026".into(),
        },
        data: DrawNumbers {
            first_prize: "820845".into(),
            last_two_digits: "99".into(),
            three_digit_front: vec![PrizeRound {
                round: 1,
                value: "231".into(),
            }],
            three_digit_back: vec![PrizeRound {
                round: 1,
                value: "017".into(),
            }],
        },
    }
}

#[test]
fn test_book_survives_reopen_and_keeps_filling_buckets() {
    let (_dir, config) = setup_test();

    let buyer_id = {
        let book = Book::open(&config).unwrap();
        let buyer = book.add_buyer("Somchai", Some("0812345678")).unwrap();
        book.save_cut_config(&CutConfigInput {
            two_digit_top: Some("150".into()),
            two_digit_bottom: Some("40".into()),
            ..Default::default()
        })
        .unwrap();
        book.record_entries(&[entry(buyer.id, "45", "100", "30")])
            .unwrap();
        buyer.id
    };

    let book = Book::open(&config).unwrap();
    let second = book
        .record_entries(&[entry(buyer_id, "45", "100", "30")])
        .unwrap();
    let top = second[0].wager.get(Pattern::TwoDigitTop).unwrap();
    let bottom = second[0].wager.get(Pattern::TwoDigitBottom).unwrap();
    assert_eq!((top.kept, top.sent), (d("50"), d("50")));
    assert_eq!((bottom.kept, bottom.sent), (d("10"), d("20")));
    assert_eq!(book.entries().unwrap().len(), 2);
}

#[test]
fn test_new_cut_version_applies_only_to_later_entries() {
    let (_dir, config) = setup_test();
    let book = Book::open(&config).unwrap();
    let buyer = book.add_buyer("Anong", None).unwrap();

    assert!(matches!(
        book.record_entries(&[entry(buyer.id, "45", "10", "")]),
        Err(PoolError::ConfigMissing)
    ));

    let v1 = book
        .save_cut_config(&CutConfigInput {
            two_digit_top: Some("100".into()),
            ..Default::default()
        })
        .unwrap();
    book.record_entries(&[entry(buyer.id, "45", "80", "")])
        .unwrap();

    let v2 = book
        .save_cut_config(&CutConfigInput {
            two_digit_top: Some("200".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!((v1.version, v2.version), (1, 2));

    book.record_entries(&[entry(buyer.id, "45", "150", "")])
        .unwrap();

    let entries = book.entries().unwrap();
    assert_eq!(entries[0].cut_version, Some(1));
    assert_eq!(entries[1].cut_version, Some(2));
    // the first split is never recomputed
    assert_eq!(entries[0].wager.get(Pattern::TwoDigitTop).unwrap().kept, d("80"));
    let later = entries[1].wager.get(Pattern::TwoDigitTop).unwrap();
    assert_eq!((later.kept, later.sent), (d("120"), d("30")));
}

#[test]
fn test_settlement_over_recorded_book() {
    let (_dir, config) = setup_test();
    let book = Book::open(&config).unwrap();
    let a = book.add_buyer("A", None).unwrap();
    let b = book.add_buyer("B", None).unwrap();
    book.save_cut_config(&CutConfigInput {
        two_digit_top: Some("100".into()),
        two_digit_bottom: Some("1000".into()),
        ..Default::default()
    })
    .unwrap();

    book.record_entries(&[
        entry(a.id, "45", "80", ""),
        entry(b.id, "45", "50", ""),
        entry(b.id, "99", "", "1000"),
        EntryInput {
            buyer_id: a.id,
            number: "312".into(),
            tod: Some("10".into()),
            ..Default::default()
        },
    ])
    .unwrap();

    book.cache_draw(&draw()).unwrap();
    let cached = book.cached_draw("2026-10-16").unwrap().unwrap();
    let settlement = book.settle(&cached).unwrap();

    assert_eq!(settlement.winners.len(), 4);
    let totals = settlement.totals;
    // 45 top: A kept 80, B kept 20 sent 30; 99 bottom kept 1000; tod forwarded
    assert_eq!(totals.operator_payout, d("6500") + d("65000"));
    assert_eq!(totals.dealer_payout, d("1950") + d("950"));
    assert_eq!(totals.kept_stakes, d("1100"));
    assert_eq!(totals.operator_net, d("1100") - d("71500"));

    let dealer = book.source_view(Source::Dealer).unwrap();
    assert_eq!(dealer.len(), 2);
}

#[test]
fn test_pair_delete_and_reset_clear_both_views() {
    let (_dir, config) = setup_test();
    let book = Book::open(&config).unwrap();
    let buyer = book.add_buyer("A", None).unwrap();
    book.save_cut_config(&CutConfigInput {
        two_digit_top: Some("50".into()),
        ..Default::default()
    })
    .unwrap();
    book.record_entries(&[
        entry(buyer.id, "45", "100", ""),
        entry(buyer.id, "46", "100", ""),
    ])
    .unwrap();

    assert_eq!(book.delete_pair(buyer.id, "45").unwrap(), 1);
    assert_eq!(book.source_view(Source::Own).unwrap().len(), 1);
    assert_eq!(book.source_view(Source::Dealer).unwrap().len(), 1);

    assert_eq!(book.reset().unwrap(), 1);
    assert!(book.source_view(Source::Own).unwrap().is_empty());
    assert!(book.source_view(Source::Dealer).unwrap().is_empty());
    assert_eq!(book.summary(None).unwrap().entry_count, 0);
}
