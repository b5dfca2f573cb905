use clap::Parser;
use riskpredict::model::{Forest, Model};
use riskpredict::{Classifier, ModelBundle};
use std::error::Error;

#[derive(Parser)]
struct Cli {
    bundle: String,
    /// Print every tree node, not just tree sizes
    #[arg(short, long)]
    nodes: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Cli::parse();

    let bundle = ModelBundle::load(&args.bundle)?;
    let names = bundle.feature_names();

    match bundle.classifier() {
        Classifier::Direct(c) => println!("direct labels: {:?}", c.classes),
        Classifier::Encoded(c) => {
            println!("codes: {:?}", c.codes);
            println!("encoder: {:?}", c.label_encoder.classes());
        }
    }

    match bundle.model() {
        Model::Linear(m) => {
            println!("linear model, {} outputs", m.n_outputs());
            for k in 0..m.n_outputs() {
                println!("output {} intercept: {}", k, m.intercept[k]);
                for (i, name) in names.iter().enumerate() {
                    let w = m.w[k * m.n_features + i];
                    if w != 0.0 {
                        println!("  {}: {}", name, w);
                    }
                }
            }
        }
        Model::Forest(f) => dump_forest(f, names, args.nodes),
        Model::Prior(p) => println!("prior model: {:?}", p.priors),
    }

    Ok(())
}

fn dump_forest(forest: &Forest, names: &[String], nodes: bool) {
    println!(
        "forest: {} trees, {} groups, base score {:?}",
        forest.trees.len(),
        forest.n_groups,
        forest.base_score
    );
    for (t, (tree, group)) in forest.trees.iter().zip(&forest.tree_group).enumerate() {
        println!("tree {} (group {}): {} nodes", t, group, tree.n_nodes());
        if !nodes {
            continue;
        }
        for n in 0..tree.n_nodes() {
            if tree.is_leaf[n] {
                println!("  {}: leaf {}", n, tree.leaf_value[n]);
            } else {
                println!(
                    "  {}: {} < {} ? {} : {} (missing {})",
                    n,
                    names[tree.split_feature[n] as usize],
                    tree.threshold[n],
                    tree.left[n],
                    tree.right[n],
                    if tree.default_left[n] { "left" } else { "right" }
                );
            }
        }
    }
}
