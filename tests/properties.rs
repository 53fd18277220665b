use std::io;

use bytes::Bytes;
use proptest::collection::vec;
use proptest::prelude::*;

use shf_engine::{
    BaseNonce, ByteSource, DecryptOptions, Dek, EncryptOptions, EncryptionHeader, Error, Ikm,
    IkmMethod, MemorySink, Salt, StreamSource, TAG_SIZE, create_encryption_header, decrypt_file,
    encrypt_file,
};

const PASSWORD: &str = "property password";

fn source(data: &[u8], segment: usize) -> impl ByteSource {
    let segments: Vec<io::Result<Bytes>> = data
        .chunks(segment)
        .map(|piece| Ok(Bytes::copy_from_slice(piece)))
        .collect();
    StreamSource::new(futures::stream::iter(segments))
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
        .block_on(future)
}

async fn encrypt(data: &[u8], chunk_size: usize, segment: usize) -> (Vec<u8>, usize) {
    let salt = Salt::from_bytes(&[9u8; 32]);
    let ikm = Ikm::from_password(PASSWORD).expect("ikm");
    let dek = Dek::derive(&ikm, &salt).expect("dek");
    let base_nonce = BaseNonce::derive(&ikm, &salt).expect("base nonce");
    let header = EncryptionHeader::new(IkmMethod::Password, salt);
    let header_len = create_encryption_header(&header).expect("header").len();

    let mut sink = MemorySink::new();
    encrypt_file(
        &mut source(data, segment),
        &mut sink,
        &dek,
        &base_nonce,
        &header,
        EncryptOptions::default().with_chunk_size(chunk_size),
    )
    .await
    .expect("encrypt");
    (sink.into_inner(), header_len)
}

async fn decrypt(ciphertext: &[u8], chunk_size: usize, segment: usize) -> Vec<u8> {
    let mut sink = MemorySink::new();
    decrypt_file(
        &mut source(ciphertext, segment),
        &mut sink,
        |_| async { Ikm::from_password(PASSWORD).map_err(Error::from) },
        DecryptOptions::default().with_chunk_size(chunk_size),
    )
    .await
    .expect("decrypt");
    sink.into_inner()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn roundtrip_any_chunking(
        data in vec(any::<u8>(), 0..=2048),
        chunk_size in 1usize..300,
        write_segment in 1usize..500,
        read_segment in 1usize..500,
    ) {
        let plaintext = block_on(async {
            let (ciphertext, _) = encrypt(&data, chunk_size, write_segment).await;
            decrypt(&ciphertext, chunk_size, read_segment).await
        });
        prop_assert_eq!(plaintext, data);
    }

    #[test]
    fn ciphertext_ignores_input_segmentation(
        data in vec(any::<u8>(), 0..=1024),
        chunk_size in 1usize..200,
        a in 1usize..300,
        b in 1usize..300,
    ) {
        let (first, second) = block_on(async {
            (encrypt(&data, chunk_size, a).await, encrypt(&data, chunk_size, b).await)
        });
        prop_assert_eq!(first, second);
    }

    #[test]
    fn ciphertext_length_matches_chunk_count(
        data in vec(any::<u8>(), 0..=2048),
        chunk_size in 1usize..300,
    ) {
        let (ciphertext, header_len) = block_on(encrypt(&data, chunk_size, 64));
        let chunks = data.len().div_ceil(chunk_size).max(1);
        prop_assert_eq!(ciphertext.len(), header_len + data.len() + chunks * TAG_SIZE);
    }

    #[test]
    fn nonces_differ_per_index(base in any::<[u8; 12]>(), i in any::<u64>(), j in any::<u64>()) {
        prop_assume!(i != j);
        let base = BaseNonce::from_bytes(&base).expect("base nonce");
        prop_assert_ne!(base.nonce(i), base.nonce(j));
    }
}
