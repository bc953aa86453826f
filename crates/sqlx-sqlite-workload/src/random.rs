use rand::Rng;
use rand::distributions::Alphanumeric;

/// Random `[a-zA-Z0-9]` text with a length drawn uniformly from `[min_len, max_len)`.
///
/// Not reproducible across runs. Callers validate the range first; an empty
/// range panics.
pub fn random_text(min_len: usize, max_len: usize) -> String {
   let mut rng = rand::thread_rng();
   let len = rng.gen_range(min_len..max_len);
   (&mut rng)
      .sample_iter(&Alphanumeric)
      .take(len)
      .map(char::from)
      .collect()
}
