/// Red-black node colour, extended with Matt Might's negative-black and
/// double-black colours used while rebalancing a deletion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Color {
    Red,
    Black,
    BlackBlack,
    NegativeBlack,
}

impl Color {
    #[inline]
    pub fn blacken(&mut self) {
        match *self {
            Color::Red => *self = Color::Black,
            Color::Black => *self = Color::BlackBlack,
            Color::BlackBlack => unreachable!(),
            Color::NegativeBlack => *self = Color::Red,
        }
    }

    #[inline]
    pub fn redden(&mut self) {
        match *self {
            Color::Red => *self = Color::NegativeBlack,
            Color::Black => *self = Color::Red,
            Color::BlackBlack => *self = Color::Black,
            Color::NegativeBlack => unreachable!(),
        }
    }
}
