//! End-to-end pipeline tests: training, encoding, decoding, templates,
//! truncation/padding and model persistence across all four algorithms.

use segmentar::config::{Algorithm, ModelFamily, TokenizerConfig};
use segmentar::model::{CharLevelModel, Model};
use segmentar::Tokenizer;

fn no_specials(config: TokenizerConfig) -> TokenizerConfig {
    TokenizerConfig {
        unk_token: String::new(),
        pad_token: String::new(),
        bos_token: String::new(),
        eos_token: String::new(),
        mask_token: String::new(),
        sep_token: String::new(),
        cls_token: String::new(),
        ..config
    }
}

#[test]
fn test_bpe_train_encode_decode_workflow() {
    let config = TokenizerConfig {
        vocab_size: 80,
        min_frequency: 1,
        ..TokenizerConfig::default()
    };
    let mut tokenizer = Tokenizer::new(config).expect("config should be valid");
    tokenizer
        .train(&[
            "low low low low low",
            "lower lower",
            "newest newest newest newest newest newest",
            "widest widest widest",
        ])
        .expect("training should succeed");

    let encoding = tokenizer.encode("lowest newest").expect("encode");
    assert_eq!(encoding.input_ids.len(), 1);
    assert!(!encoding.input_ids[0].is_empty());

    let decoded = tokenizer
        .decode(&encoding.input_ids[0], true)
        .expect("decode");
    assert_eq!(decoded, "lowest newest");
}

#[test]
fn test_bert_wordpiece_sequence() {
    let config = TokenizerConfig {
        algorithm: Algorithm::WordPiece,
        model_family: ModelFamily::Bert,
        pad_token: String::new(),
        bos_token: String::new(),
        eos_token: String::new(),
        mask_token: String::new(),
        ..TokenizerConfig::default()
    };
    let mut tokenizer = Tokenizer::new(config).expect("config");
    tokenizer
        .install_wordpiece(["un", "##aff", "##able", "do", "##ing"])
        .expect("install");

    let encoding = tokenizer.encode("unaffable doing").expect("encode");
    let texts: Vec<&str> = encoding.input_ids[0]
        .iter()
        .map(|&id| tokenizer.id_to_token(id).expect("known id"))
        .collect();
    assert_eq!(
        texts,
        vec!["[CLS]", "un", "##aff", "##able", "do", "##ing", "[SEP]"]
    );

    let decoded = tokenizer
        .decode(&encoding.input_ids[0], true)
        .expect("decode");
    assert_eq!(decoded, "unaffable doing");
}

#[test]
fn test_byte_level_roundtrip_is_byte_exact() {
    let config = no_specials(TokenizerConfig {
        algorithm: Algorithm::CharLevel,
        byte_level: true,
        ..TokenizerConfig::default()
    });
    let mut tokenizer = Tokenizer::new(config).expect("config");
    tokenizer.install_byte_level().expect("install");

    let input = "héllo";
    let encoding = tokenizer.encode(input).expect("encode");
    // One token per byte: "é" is two bytes.
    assert_eq!(encoding.input_ids[0].len(), input.len());
    let decoded = tokenizer
        .decode(&encoding.input_ids[0], true)
        .expect("decode");
    assert_eq!(decoded, input);
}

#[test]
fn test_template_wraps_message() {
    let mut config = no_specials(TokenizerConfig {
        algorithm: Algorithm::CharLevel,
        chat_template: "<bos>{{message}}<eos>".to_string(),
        ..TokenizerConfig::default()
    });
    config.added_tokens.insert("<bos>".to_string(), 1);
    config.added_tokens.insert("<eos>".to_string(), 2);

    let mut tokenizer = Tokenizer::new(config).expect("config");
    tokenizer.add_tokens(["h", "i"]);
    tokenizer.set_model(Model::CharLevel(CharLevelModel::new()));

    let encoding = tokenizer.encode("hi").expect("encode");
    let h = tokenizer.token_to_id("h").expect("h");
    let i = tokenizer.token_to_id("i").expect("i");
    assert_eq!(encoding.input_ids[0], vec![1, h, i, 2]);

    // Boundary tokens are specials: skip_special decode drops them.
    let decoded = tokenizer
        .decode(&encoding.input_ids[0], true)
        .expect("decode");
    assert_eq!(decoded, "hi");
}

fn boundary_config(max_length: usize) -> TokenizerConfig {
    // [PAD] takes id 0, the added boundary tokens ids 1 and 2.
    let mut config = TokenizerConfig {
        algorithm: Algorithm::CharLevel,
        chat_template: "<bos>{{message}}<eos>".to_string(),
        max_length,
        pad_to_max_length: true,
        unk_token: String::new(),
        bos_token: String::new(),
        eos_token: String::new(),
        mask_token: String::new(),
        sep_token: String::new(),
        cls_token: String::new(),
        ..TokenizerConfig::default()
    };
    config.added_tokens.insert("<bos>".to_string(), 1);
    config.added_tokens.insert("<eos>".to_string(), 2);
    config
}

#[test]
fn test_truncation_preserves_boundary_specials() {
    let mut tokenizer = Tokenizer::new(boundary_config(5)).expect("config");
    tokenizer.add_tokens(["a", "b", "c", "d", "e"]);
    tokenizer.set_model(Model::CharLevel(CharLevelModel::new()));

    let encoding = tokenizer.encode("abcde").expect("encode");
    let id = |t: &str| tokenizer.token_to_id(t).expect("token");
    // Post-processing yields <bos> a b c d e <eos>; truncation keeps the
    // closing boundary special and spills the content overflow.
    assert_eq!(
        encoding.input_ids[0],
        vec![1, id("a"), id("b"), id("c"), 2]
    );
    assert_eq!(encoding.attention_mask[0], vec![1, 1, 1, 1, 1]);
    assert_eq!(encoding.overflowing_tokens[0], vec![id("d"), id("e")]);
    assert_eq!(encoding.length[0], 5);
}

#[test]
fn test_padding_fills_to_max_length() {
    let mut tokenizer = Tokenizer::new(boundary_config(9)).expect("config");
    tokenizer.add_tokens(["a", "b", "c", "d", "e"]);
    tokenizer.set_model(Model::CharLevel(CharLevelModel::new()));

    let encoding = tokenizer.encode("abcde").expect("encode");
    assert_eq!(encoding.input_ids[0].len(), 9);
    assert_eq!(&encoding.input_ids[0][7..], &[0, 0]);
    assert_eq!(
        encoding.attention_mask[0],
        vec![1, 1, 1, 1, 1, 1, 1, 0, 0]
    );
    assert_eq!(encoding.length[0], 7);
    let mask_sum: u32 = encoding.attention_mask[0].iter().map(|&m| u32::from(m)).sum();
    let pad_count = encoding.input_ids[0].iter().filter(|&&id| id == 0).count();
    assert_eq!(mask_sum as usize, encoding.input_ids[0].len() - pad_count);
}

#[test]
fn test_encode_pair_marks_second_segment() {
    let config = TokenizerConfig {
        algorithm: Algorithm::WordPiece,
        model_family: ModelFamily::Bert,
        pad_token: String::new(),
        bos_token: String::new(),
        eos_token: String::new(),
        mask_token: String::new(),
        ..TokenizerConfig::default()
    };
    let mut tokenizer = Tokenizer::new(config).expect("config");
    tokenizer
        .install_wordpiece(["un", "##aff", "##able", "do", "##ing"])
        .expect("install");

    let encoding = tokenizer
        .encode_pair("unaffable", "doing")
        .expect("encode pair");
    let texts: Vec<&str> = encoding.input_ids[0]
        .iter()
        .map(|&id| tokenizer.id_to_token(id).expect("known id"))
        .collect();
    assert_eq!(
        texts,
        vec!["[CLS]", "un", "##aff", "##able", "[SEP]", "do", "##ing", "[SEP]"]
    );
    assert_eq!(
        encoding.token_type_ids[0],
        vec![0, 0, 0, 0, 0, 1, 1, 1]
    );
}

#[test]
fn test_batch_encode_matches_single() {
    let config = TokenizerConfig {
        vocab_size: 60,
        min_frequency: 1,
        ..TokenizerConfig::default()
    };
    let mut tokenizer = Tokenizer::new(config).expect("config");
    tokenizer
        .train(&["aaa bbb ccc", "abc cab bca"])
        .expect("train");

    let inputs = ["aaa", "bbb ccc", "", "abc"];
    let batch = tokenizer.encode_batch(&inputs).expect("batch");
    assert_eq!(batch.len(), inputs.len());
    for (i, input) in inputs.iter().enumerate() {
        let single = tokenizer.encode(input).expect("single");
        assert_eq!(batch.input_ids[i], single.input_ids[0]);
        assert_eq!(batch.attention_mask[i], single.attention_mask[0]);
        assert_eq!(batch.length[i], single.length[0]);
    }
}

#[test]
fn test_decode_batch_is_pointwise() {
    let config = TokenizerConfig {
        vocab_size: 60,
        min_frequency: 1,
        ..TokenizerConfig::default()
    };
    let mut tokenizer = Tokenizer::new(config).expect("config");
    tokenizer.train(&["one two three"]).expect("train");

    let rows: Vec<Vec<i32>> = ["one", "two three"]
        .iter()
        .map(|text| tokenizer.encode(text).expect("encode").input_ids.remove(0))
        .collect();
    let decoded = tokenizer.decode_batch(&rows, true).expect("decode");
    assert_eq!(decoded, vec!["one", "two three"]);
}
