//! Expression set, per-frame score maps and the emoji lookup table.

use std::fmt;

/// The fixed set of facial expressions the classifier reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Expression {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

impl Expression {
    /// Canonical order. Score maps built by the classifier follow it.
    pub const ALL: [Expression; 7] = [
        Expression::Neutral,
        Expression::Happy,
        Expression::Sad,
        Expression::Angry,
        Expression::Fearful,
        Expression::Disgusted,
        Expression::Surprised,
    ];

    /// Lowercase key, as used in logs
    pub fn key(self) -> &'static str {
        match self {
            Expression::Neutral => "neutral",
            Expression::Happy => "happy",
            Expression::Sad => "sad",
            Expression::Angry => "angry",
            Expression::Fearful => "fearful",
            Expression::Disgusted => "disgusted",
            Expression::Surprised => "surprised",
        }
    }

    /// Text and emoji shown for this expression
    pub fn display(self) -> ExpressionDisplay {
        let (text, emoji) = match self {
            Expression::Happy => ("Happy", "😄"),
            Expression::Sad => ("Sad", "😢"),
            Expression::Angry => ("Angry", "😡"),
            Expression::Disgusted => ("Disgusted", "🤢"),
            Expression::Surprised => ("Surprised", "😲"),
            Expression::Neutral => ("Neutral", "😐"),
            Expression::Fearful => ("Fearful", "😨"),
        };
        ExpressionDisplay { text, emoji }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display().text)
    }
}

/// What the view shows for the current expression
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpressionDisplay {
    pub text: &'static str,
    pub emoji: &'static str,
}

impl Default for ExpressionDisplay {
    fn default() -> Self {
        Expression::Neutral.display()
    }
}

/// Per-frame confidence for each expression, in insertion order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpressionScores {
    scores: Vec<(Expression, f32)>,
}

impl ExpressionScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the score for an expression. An existing entry keeps its position.
    pub fn set(&mut self, expression: Expression, score: f32) {
        match self.scores.iter_mut().find(|(e, _)| *e == expression) {
            Some(entry) => entry.1 = score,
            None => self.scores.push((expression, score)),
        }
    }

    /// Adds to the score for an expression, inserting it if missing
    pub fn accumulate(&mut self, expression: Expression, score: f32) {
        match self.scores.iter_mut().find(|(e, _)| *e == expression) {
            Some(entry) => entry.1 += score,
            None => self.scores.push((expression, score)),
        }
    }

    pub fn get(&self, expression: Expression) -> Option<f32> {
        self.scores
            .iter()
            .find(|(e, _)| *e == expression)
            .map(|(_, s)| *s)
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Expression, f32)> + '_ {
        self.scores.iter().copied()
    }

    /// Highest-scoring expression and its score.
    ///
    /// Ties go to the entry inserted first. NaN scores are skipped, and an
    /// empty (or all-NaN) map yields `None`.
    pub fn dominant(&self) -> Option<(Expression, f32)> {
        let mut best: Option<(Expression, f32)> = None;
        for (expression, score) in self.iter() {
            if score.is_nan() {
                continue;
            }
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((expression, score)),
            }
        }
        best
    }

    /// Maps the dominant expression to its display entry
    pub fn to_display(&self) -> Option<ExpressionDisplay> {
        self.dominant().map(|(expression, _)| expression.display())
    }
}

impl FromIterator<(Expression, f32)> for ExpressionScores {
    fn from_iter<I: IntoIterator<Item = (Expression, f32)>>(iter: I) -> Self {
        let mut scores = ExpressionScores::new();
        for (expression, score) in iter {
            scores.set(expression, score);
        }
        scores
    }
}

impl fmt::Display for ExpressionScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (expression, score) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{}={:.2}", expression.key(), score)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(Expression, f32)]) -> ExpressionScores {
        pairs.iter().copied().collect()
    }

    #[test]
    fn unique_maximum_selects_its_table_entry() {
        let map = scores(&[
            (Expression::Neutral, 0.2),
            (Expression::Happy, 0.1),
            (Expression::Angry, 0.6),
            (Expression::Sad, 0.1),
        ]);
        assert_eq!(map.dominant(), Some((Expression::Angry, 0.6)));
        assert_eq!(
            map.to_display(),
            Some(ExpressionDisplay {
                text: "Angry",
                emoji: "😡"
            })
        );
    }

    #[test]
    fn happy_face_shows_happy() {
        let map = scores(&[
            (Expression::Neutral, 0.2),
            (Expression::Happy, 0.9),
            (Expression::Sad, 0.1),
            (Expression::Angry, 0.0),
            (Expression::Fearful, 0.0),
            (Expression::Disgusted, 0.0),
            (Expression::Surprised, 0.05),
        ]);
        let display = map.to_display().unwrap();
        assert_eq!(display.text, "Happy");
        assert_eq!(display.emoji, "😄");
    }

    #[test]
    fn neutral_face_shows_neutral() {
        let map = scores(&[(Expression::Neutral, 0.99), (Expression::Happy, 0.01)]);
        let display = map.to_display().unwrap();
        assert_eq!(display.text, "Neutral");
        assert_eq!(display.emoji, "😐");
    }

    #[test]
    fn ties_resolve_to_first_inserted() {
        let map = scores(&[
            (Expression::Sad, 0.4),
            (Expression::Happy, 0.4),
            (Expression::Neutral, 0.2),
        ]);
        assert_eq!(map.dominant().map(|(e, _)| e), Some(Expression::Sad));

        let reversed = scores(&[
            (Expression::Happy, 0.4),
            (Expression::Sad, 0.4),
            (Expression::Neutral, 0.2),
        ]);
        assert_eq!(reversed.dominant().map(|(e, _)| e), Some(Expression::Happy));
    }

    #[test]
    fn empty_map_selects_nothing() {
        let map = ExpressionScores::new();
        assert!(map.is_empty());
        assert_eq!(map.dominant(), None);
        assert_eq!(map.to_display(), None);
    }

    #[test]
    fn nan_scores_are_ignored() {
        let map = scores(&[(Expression::Happy, f32::NAN), (Expression::Sad, 0.3)]);
        assert_eq!(map.dominant(), Some((Expression::Sad, 0.3)));

        let all_nan = scores(&[(Expression::Happy, f32::NAN)]);
        assert_eq!(all_nan.dominant(), None);
    }

    #[test]
    fn set_keeps_position_and_accumulate_adds() {
        let mut map = ExpressionScores::new();
        map.set(Expression::Happy, 0.1);
        map.set(Expression::Sad, 0.2);
        map.set(Expression::Happy, 0.3);
        map.accumulate(Expression::Sad, 0.1);
        map.accumulate(Expression::Angry, 0.05);

        let entries: Vec<_> = map.iter().map(|(e, _)| e).collect();
        assert_eq!(
            entries,
            vec![Expression::Happy, Expression::Sad, Expression::Angry]
        );
        assert_eq!(map.get(Expression::Happy), Some(0.3));
        assert!((map.get(Expression::Sad).unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn lookup_table_covers_every_expression() {
        let emojis: Vec<_> = Expression::ALL.iter().map(|e| e.display().emoji).collect();
        assert_eq!(emojis, vec!["😐", "😄", "😢", "😡", "😨", "🤢", "😲"]);
        assert_eq!(ExpressionDisplay::default().text, "Neutral");
        assert_eq!(Expression::Fearful.to_string(), "Fearful");
    }

    #[test]
    fn scores_render_for_logs() {
        let map = scores(&[(Expression::Happy, 0.9), (Expression::Sad, 0.25)]);
        assert_eq!(map.to_string(), "happy=0.90, sad=0.25");
    }
}
