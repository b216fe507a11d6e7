use rand::Rng;

pub const TAG_LEN: usize = 10;
const TAG_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Returns a fresh correlation tag of lowercase letters and digits.
pub fn random_tag() -> String {
    let mut rng = rand::thread_rng();
    (0..TAG_LEN)
        .map(|_| char::from(TAG_ALPHABET[rng.gen_range(0..TAG_ALPHABET.len())]))
        .collect()
}
