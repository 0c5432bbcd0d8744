use chrono::NaiveDate;
use expense_repo::payment_repo::NewPayment;
use fake::faker::lorem::en::Sentence;
use fake::{Fake, Faker};
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::HashSet;

pub trait Generator<T> {
    fn gen(&mut self) -> T;
}

pub struct Predefined<T> {
    values: Vec<T>,
    current_pos: usize,
}

impl<T> Predefined<T> {
    pub fn boxed(values: Vec<T>) -> Box<Predefined<T>> {
        Box::new(Predefined {
            values,
            current_pos: 0,
        })
    }
}

impl<T: Clone> Generator<T> for Predefined<T> {
    fn gen(&mut self) -> T {
        let v = self.values[self.current_pos].clone();
        self.current_pos += 1;
        v
    }
}

pub struct RandomSample<T> {
    values: Vec<T>,
}

impl<T> RandomSample<T> {
    pub fn boxed(values: Vec<T>) -> Box<RandomSample<T>> {
        Box::new(RandomSample { values })
    }
}

impl<T: Clone> Generator<T> for RandomSample<T> {
    fn gen(&mut self) -> T {
        self.values.choose(&mut rand::thread_rng()).unwrap().clone()
    }
}

pub struct FakeGenerator<F: Fake> {
    fake: F,
}

impl<F: Fake> FakeGenerator<F> {
    pub fn boxed(fake: F) -> Box<FakeGenerator<F>> {
        Box::new(FakeGenerator { fake })
    }
}

impl<T: fake::Dummy<F>, F> Generator<T> for FakeGenerator<F> {
    fn gen(&mut self) -> T {
        self.fake.fake()
    }
}

/// Non-negative amounts with at most two decimal places.
struct FakeAmount;

impl Generator<Decimal> for FakeAmount {
    fn gen(&mut self) -> Decimal {
        Decimal::new(rand::thread_rng().gen_range(0..1_000_000), 2)
    }
}

struct FakeDate;

impl Generator<NaiveDate> for FakeDate {
    fn gen(&mut self) -> NaiveDate {
        let mut rng = rand::thread_rng();
        let (year, month, day) = (
            rng.gen_range(2020..2025),
            rng.gen_range(1..13),
            rng.gen_range(1..29),
        );
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }
}

#[allow(dead_code)]
pub struct NewPaymentGenerator {
    info_gen: Box<dyn Generator<String>>,
    amnt_gen: Box<dyn Generator<Decimal>>,
    date_gen: Box<dyn Generator<NaiveDate>>,
    paid_gen: Box<dyn Generator<bool>>,
    tag_gen: Box<dyn Generator<HashSet<String>>>,
}

#[allow(dead_code)]
impl NewPaymentGenerator {
    pub fn with_dates(mut self, dates: Vec<NaiveDate>) -> NewPaymentGenerator {
        self.date_gen = Predefined::boxed(dates);
        self
    }

    pub fn with_amounts(mut self, amounts: Vec<Decimal>) -> NewPaymentGenerator {
        self.amnt_gen = Predefined::boxed(amounts);
        self
    }

    pub fn with_paid(mut self, paid: Vec<bool>) -> NewPaymentGenerator {
        self.paid_gen = Predefined::boxed(paid);
        self
    }

    pub fn with_tags(mut self, tags: Vec<HashSet<String>>) -> NewPaymentGenerator {
        self.tag_gen = Predefined::boxed(tags);
        self
    }

    /// Picks every tag set at random from `tag_sets`.
    pub fn with_tag_sample(mut self, tag_sets: Vec<HashSet<String>>) -> NewPaymentGenerator {
        self.tag_gen = RandomSample::boxed(tag_sets);
        self
    }

    pub fn generate(&mut self) -> NewPayment {
        NewPayment::new(
            self.info_gen.gen(),
            self.amnt_gen.gen(),
            self.date_gen.gen(),
            self.paid_gen.gen(),
            self.tag_gen.gen(),
        )
    }

    pub fn generate_many(&mut self, count: usize) -> Vec<NewPayment> {
        let mut vec = Vec::with_capacity(count);
        for _ in 0..count {
            vec.push(self.generate())
        }
        vec
    }
}

impl Default for NewPaymentGenerator {
    fn default() -> Self {
        NewPaymentGenerator {
            info_gen: FakeGenerator::boxed(Sentence(2..5)),
            amnt_gen: Box::new(FakeAmount),
            date_gen: Box::new(FakeDate),
            paid_gen: FakeGenerator::boxed(Faker),
            tag_gen: RandomSample::boxed(vec![HashSet::new()]),
        }
    }
}
