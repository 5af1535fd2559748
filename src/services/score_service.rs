use rust_decimal::Decimal;

use crate::models::test::TestType;

/// Converts raw correct counts into scaled section scores.
pub trait ScoreTable: Send + Sync {
    fn listening(&self, correct: usize) -> i32;
    fn reading(&self, correct: usize) -> i32;
}

const MAX_RAW: usize = 100;

#[rustfmt::skip]
static LISTENING: [i32; MAX_RAW + 1] = [
    5, 5, 5, 5, 5, 5, 5, 10, 15, 20,
    25, 30, 35, 40, 45, 50, 55, 60, 65, 70,
    75, 80, 85, 90, 95, 100, 105, 110, 115, 120,
    125, 130, 135, 140, 145, 150, 155, 160, 165, 170,
    175, 180, 185, 190, 195, 200, 205, 215, 220, 225,
    230, 235, 245, 250, 255, 260, 265, 270, 280, 285,
    290, 295, 300, 305, 315, 320, 325, 330, 335, 340,
    350, 355, 360, 365, 370, 375, 385, 390, 395, 400,
    405, 410, 420, 425, 430, 435, 440, 445, 455, 460,
    465, 470, 475, 480, 490, 495, 495, 495, 495, 495,
    495,
];

#[rustfmt::skip]
static READING: [i32; MAX_RAW + 1] = [
    5, 5, 5, 10, 15, 20, 25, 30, 35, 40,
    45, 50, 55, 60, 65, 70, 75, 80, 85, 90,
    95, 100, 105, 110, 115, 120, 125, 130, 135, 140,
    145, 145, 150, 155, 160, 165, 170, 175, 180, 185,
    185, 190, 195, 200, 205, 210, 215, 220, 225, 230,
    230, 235, 240, 245, 250, 255, 260, 265, 270, 275,
    275, 280, 285, 290, 295, 300, 305, 310, 315, 320,
    320, 325, 330, 335, 340, 345, 355, 360, 365, 370,
    375, 380, 390, 395, 400, 405, 410, 415, 425, 430,
    435, 440, 445, 450, 460, 465, 470, 475, 480, 485,
    495,
];

/// Standard listening/reading conversion. Counts above 100 clamp to 100.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToeicScoreTable;

impl ScoreTable for ToeicScoreTable {
    fn listening(&self, correct: usize) -> i32 {
        LISTENING[correct.min(MAX_RAW)]
    }

    fn reading(&self, correct: usize) -> i32 {
        READING[correct.min(MAX_RAW)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaledScores {
    pub listening: Option<i32>,
    pub reading: Option<i32>,
    pub total: Option<Decimal>,
}

/// Simulator tests get scaled section scores and their sum; practice tests
/// report raw counts only.
pub fn scale(
    table: &dyn ScoreTable,
    test_type: TestType,
    listening_correct: usize,
    reading_correct: usize,
) -> ScaledScores {
    match test_type {
        TestType::Practice => ScaledScores {
            listening: None,
            reading: None,
            total: None,
        },
        TestType::Simulator => {
            let listening = table.listening(listening_correct);
            let reading = table.reading(reading_correct);
            ScaledScores {
                listening: Some(listening),
                reading: Some(reading),
                total: Some(Decimal::from(listening + reading)),
            }
        }
    }
}
