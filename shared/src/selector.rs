use rand::Rng;

use crate::prize_table::{PrizeEntry, PrizeTable};

/// Upper bound (exclusive) of the values a draw source yields.
pub const ROLL_RANGE: f64 = 100.0;

/// Picks a prize by walking the table's cumulative weights.
///
/// `source` yields one uniform value in `[0, 100)`. The first entry whose
/// cumulative weight reaches the value wins. When the weights sum to less
/// than the value, the last entry is returned. The index is the winning
/// slot on the wheel, which names alone cannot identify.
pub fn draw<'a, F>(table: &'a PrizeTable, mut source: F) -> (usize, &'a PrizeEntry)
where
    F: FnMut() -> f64,
{
    let roll = source();
    let mut cumulative = 0.0;

    for (index, prize) in table.entries().iter().enumerate() {
        cumulative += f64::from(prize.weight);
        if roll <= cumulative {
            return (index, prize);
        }
    }

    (table.len() - 1, table.last())
}

/// Wraps an RNG as a draw source for [`draw`].
pub fn uniform_source<R: Rng + ?Sized>(rng: &mut R) -> impl FnMut() -> f64 + '_ {
    move || rng.gen_range(0.0..ROLL_RANGE)
}
