use pt_crypto::NoteKey;
use pt_formats::{NoteHandler, TomboChi, ZipAes, ZipAesOptions, ZipMethod};

/// Text-like data so DEFLATE has something to do.
fn make_note(size: usize) -> Vec<u8> {
    b"the quick brown fox jumps over the lazy dog\n"
        .iter()
        .copied()
        .cycle()
        .take(size)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_zipaes_encode(bencher: divan::Bencher, size: usize) {
    let handler = ZipAes::new(NoteKey::from_password("password"));
    let note = make_note(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| handler.encode(divan::black_box(&note)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_zipaes_decode(bencher: divan::Bencher, size: usize) {
    let handler = ZipAes::new(NoteKey::from_password("password"));
    let encoded = handler.encode(&make_note(size)).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| handler.decode(divan::black_box(&encoded)).unwrap());
}

#[divan::bench(args = [65536])]
fn bench_zipaes_encode_stored(bencher: divan::Bencher, size: usize) {
    let options = ZipAesOptions {
        method: ZipMethod::Stored,
        ..ZipAesOptions::default()
    };
    let handler = ZipAes::with_options(NoteKey::from_password("password"), options);
    let note = make_note(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| handler.encode(divan::black_box(&note)).unwrap());
}

#[divan::bench(args = [1024, 65536])]
fn bench_tombo_decode(bencher: divan::Bencher, size: usize) {
    let handler = TomboChi::new(NoteKey::from_password("password"));
    let encoded = handler.encode(&make_note(size)).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| handler.decode(divan::black_box(&encoded)).unwrap());
}

fn main() {
    divan::main();
}
